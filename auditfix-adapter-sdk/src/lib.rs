//! Adapter contract for auditfix analyzers.
//!
//! An [`Adapter`] wraps one external tool: it reports findings as [`Issue`]s and knows how
//! to apply its own fixes. Adapters are created through an [`AdapterRegistry`] keyed by
//! tool id. [`CommandAdapter`] is the generic implementation driven by a [`ToolSpec`]; it
//! runs a command and parses a findings envelope from its stdout.
//!
//! [`Issue`]: auditfix_types::issue::Issue

mod adapter;
mod command;
mod envelope;
mod error;
mod registry;

pub use adapter::Adapter;
pub use command::{CommandAdapter, ToolSpec};
pub use envelope::{map_severity, parse_findings};
pub use error::AdapterError;
pub use registry::{AdapterFactory, AdapterRegistry};

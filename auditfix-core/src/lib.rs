//! Embeddable core library for auditfix.
//!
//! This crate is clap-free and drives everything through ports, so it can be used from
//! the CLI, from tests, or from another tool:
//! - [`ProjectValidator`]: decides whether a set of applied fixes leaves the project healthy
//! - [`Confirmer`]: asks before a safe batch or a risky single is applied
//! - [`FixJournal`]: the append-only fixes log and the per-run fixes report
//!
//! Entry points are [`run_audit`] for the phased audit and [`SafeFixEngine::run`] for a
//! fix session. Default port implementations live in [`adapters`].

pub mod adapters;
mod capabilities;
mod error;
mod lock;
mod pipeline;
pub mod ports;
mod safe_fix;
pub mod settings;

pub use capabilities::Capabilities;
pub use error::{FixSessionError, PipelineError, ValidationFailure, ValidationStage};
pub use lock::{LOCK_FILE, SessionLock};
pub use pipeline::{default_audit_path, read_audit_run, run_audit, write_audit_run};
pub use ports::{Confirmer, FixJournal, ProjectValidator};
pub use safe_fix::{FixPorts, SafeFixEngine};
pub use settings::{AuditSettings, FixSettings};

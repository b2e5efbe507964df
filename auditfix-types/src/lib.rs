//! Shared DTOs (schemas-as-code) for the auditfix workspace.
//!
//! # Design constraints
//! - These types are serialized to disk (audit runs, snapshot metadata, fix logs).
//! - Be conservative with breaking changes.
//! - Prefer adding optional fields over changing semantics.

pub mod fix;
pub mod issue;
pub mod phase;
pub mod run;
pub mod snapshot;

/// Schema identifiers.
pub mod schema {
    pub const AUDITFIX_RUN_V1: &str = "auditfix.run.v1";
    pub const AUDITFIX_FIXES_V1: &str = "auditfix.fixes.v1";
    pub const AUDITFIX_SNAPSHOT_V1: &str = "auditfix.snapshot.v1";
}

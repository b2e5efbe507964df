//! Port traits abstracting validation, user interaction and persistence from the engine.

use crate::error::ValidationFailure;
use auditfix_types::fix::{FixLogRecord, FixPreview, FixReport};
use camino::Utf8Path;

/// Checks that the project still builds after fixes were applied.
pub trait ProjectValidator: Send + Sync {
    /// `modified` holds repo-relative paths touched by the fixes.
    fn validate(&self, root: &Utf8Path, modified: &[String]) -> Result<(), ValidationFailure>;
}

/// Asks the user before fixes are applied.
pub trait Confirmer {
    /// One question for the whole safe batch.
    fn confirm_batch(&self, previews: &[FixPreview]) -> bool;

    /// One question per risky fix.
    fn confirm_risky(&self, preview: &FixPreview, risk_statement: &str) -> bool;
}

/// Persistence for the fixes log and report.
pub trait FixJournal {
    /// Append one record to the fixes log.
    fn append(&self, record: &FixLogRecord) -> anyhow::Result<()>;

    /// Replace the fixes report.
    fn write_report(&self, report: &FixReport) -> anyhow::Result<()>;
}

//! Clap-free settings for the audit and fix pipelines.

use auditfix_domain::PhaseFilter;
use auditfix_types::fix::SafetyLevel;
use camino::Utf8PathBuf;

/// Default state directory, relative to the repository root.
pub const DEFAULT_STATE_DIR: &str = ".auditfix";

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_SNAPSHOT_RETENTION: usize = 10;
pub const DEFAULT_BRANCH_PREFIX: &str = "auditfix";

/// Settings for the audit pipeline.
#[derive(Debug, Clone)]
pub struct AuditSettings {
    pub repo_root: Utf8PathBuf,
    pub filter: PhaseFilter,

    /// Width of the worker pool used by parallel phases.
    pub workers: usize,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            repo_root: Utf8PathBuf::from("."),
            filter: PhaseFilter::default(),
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Settings for a fix session.
#[derive(Debug, Clone)]
pub struct FixSettings {
    pub repo_root: Utf8PathBuf,

    /// Relative to `repo_root`.
    pub state_dir: String,

    pub level: SafetyLevel,
    pub dry_run: bool,
    pub auto_apply_safe: bool,
    pub allow_dirty: bool,
    pub branch_prefix: String,

    /// Snapshots kept after a session.
    pub snapshot_retention: usize,
}

impl Default for FixSettings {
    fn default() -> Self {
        Self {
            repo_root: Utf8PathBuf::from("."),
            state_dir: DEFAULT_STATE_DIR.to_string(),
            level: SafetyLevel::Safe,
            dry_run: false,
            auto_apply_safe: false,
            allow_dirty: false,
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
            snapshot_retention: DEFAULT_SNAPSHOT_RETENTION,
        }
    }
}

impl FixSettings {
    pub fn state_path(&self) -> Utf8PathBuf {
        self.repo_root.join(&self.state_dir)
    }
}

//! Snapshot manager for auditfix.
//!
//! Responsibilities:
//! - Back up every "critical" file (manifests, lock files, sources, config, migrations)
//!   together with its sha256.
//! - Record a git stash for uncommitted changes when the tree is a dirty repository.
//! - Restore a snapshot and verify the restored tree against the recorded checksums.
//!
//! Layout: `<state_dir>/snapshots/<id>/metadata.json` plus `<state_dir>/snapshots/<id>/files/`.

mod error;
mod manager;
mod scan;

pub use error::{SnapshotError, SnapshotResult};
pub use manager::SnapshotManager;
pub use scan::{CriticalFiles, DEFAULT_CRITICAL_PATTERNS, DEFAULT_EXCLUDED_DIRS};

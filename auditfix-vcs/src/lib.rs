//! Version control manager.
//!
//! Every operation shells out to `git` through a [`ProcessRunner`]. When the repository
//! root has no `.git` directory, operations are no-ops that return `false` / `None`; a
//! missing repository is never an error. Failed git commands are logged and reported the
//! same way.
//!
//! [`ProcessRunner`]: auditfix_process::ProcessRunner

mod branch;
mod git;
mod message;

pub use branch::{FixBranch, FixBranchState};
pub use git::GitManager;
pub use message::{COMMIT_TRAILER_FINGERPRINTS, COMMIT_TRAILER_FIXES, build_commit_message, fix_branch_name};

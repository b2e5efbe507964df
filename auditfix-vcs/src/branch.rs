use crate::GitManager;
use crate::message::build_commit_message;
use auditfix_types::fix::FixResult;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixBranchState {
    Created,
    Committed,
    Merged,
    Discarded,
}

/// A branch created for one fix attempt.
///
/// Moves `Created -> Committed -> Merged`, or to `Discarded` from either live state.
/// Which terminal state is reached is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixBranch {
    pub name: String,
    /// Branch checked out before the fix branch was created.
    pub base: Option<String>,
    pub state: FixBranchState,
}

impl FixBranch {
    /// Create and check out `name`, remembering the current branch as base.
    pub fn create(git: &GitManager, name: &str) -> Option<Self> {
        let base = git.current_branch();
        if !git.create_fix_branch(name) {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            base,
            state: FixBranchState::Created,
        })
    }

    pub fn commit(&mut self, git: &GitManager, summary: &str, results: &[FixResult]) -> bool {
        let files: Vec<&str> = results
            .iter()
            .filter(|r| r.success)
            .flat_map(|r| r.files_modified.iter().map(String::as_str))
            .collect();
        self.commit_files(git, files, &build_commit_message(summary, results))
    }

    /// Commit exactly `files` on this branch.
    pub fn commit_files<'a>(
        &mut self,
        git: &GitManager,
        files: impl IntoIterator<Item = &'a str>,
        message: &str,
    ) -> bool {
        if self.state != FixBranchState::Created && self.state != FixBranchState::Committed {
            return false;
        }
        let committed = git.commit_files(files, message);
        if committed {
            self.state = FixBranchState::Committed;
        }
        committed
    }

    /// Fast-forward the base onto the fix branch and delete it.
    pub fn merge(&mut self, git: &GitManager) -> bool {
        let Some(base) = self.base.clone() else {
            return false;
        };
        if self.state != FixBranchState::Committed || !git.switch_to_branch(&base) {
            return false;
        }
        if !git.merge_fast_forward(&self.name) {
            warn!(branch = %self.name, %base, "fast-forward merge failed");
            return false;
        }
        git.delete_branch(&self.name);
        self.state = FixBranchState::Merged;
        info!(branch = %self.name, %base, "merged fix branch");
        true
    }

    /// Switch back to the base branch and delete the fix branch.
    pub fn discard(&mut self, git: &GitManager) -> bool {
        if matches!(self.state, FixBranchState::Merged | FixBranchState::Discarded) {
            return false;
        }
        if let Some(base) = &self.base
            && !git.switch_to_branch(base)
        {
            warn!(branch = %self.name, %base, "could not switch back to base branch");
            return false;
        }
        let deleted = git.delete_branch(&self.name);
        if deleted {
            self.state = FixBranchState::Discarded;
            info!(branch = %self.name, "discarded fix branch");
        }
        deleted
    }
}

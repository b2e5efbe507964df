use auditfix_process::{CommandSpec, ProcessResult, ProcessRunner};
use auditfix_types::fix::FixResult;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Git operations rooted at one working tree.
#[derive(Clone)]
pub struct GitManager {
    root: Utf8PathBuf,
    runner: Arc<dyn ProcessRunner>,
    /// Paths ignored by the dirty check (the auditfix state directory).
    excluded: Vec<String>,
}

impl std::fmt::Debug for GitManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitManager")
            .field("root", &self.root)
            .field("excluded", &self.excluded)
            .finish()
    }
}

impl GitManager {
    pub fn new(root: impl Into<Utf8PathBuf>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
            excluded: vec![],
        }
    }

    /// Ignore `path` (relative to the root) when checking for a dirty tree.
    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.excluded.push(path.into());
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Whether the root holds git metadata.
    pub fn is_available(&self) -> bool {
        self.root.join(".git").exists()
    }

    fn git(&self, args: &[&str]) -> Option<ProcessResult> {
        if !self.is_available() {
            return None;
        }
        let spec = CommandSpec::new("git")
            .args(args.iter().copied())
            .current_dir(self.root.clone())
            .env("GIT_TERMINAL_PROMPT", "0");
        match self.runner.run(&spec) {
            Ok(result) => {
                if !result.success() {
                    debug!(command = %spec.display(), reason = %result.failure_reason(), "git failed");
                }
                Some(result)
            }
            Err(e) => {
                warn!(command = %spec.display(), error = %e, "could not run git");
                None
            }
        }
    }

    fn git_ok(&self, args: &[&str]) -> bool {
        self.git(args).is_some_and(|r| r.success())
    }

    fn git_stdout(&self, args: &[&str]) -> Option<String> {
        self.git(args)
            .filter(ProcessResult::success)
            .map(|r| r.stdout.trim().to_string())
    }

    pub fn is_dirty(&self) -> Option<bool> {
        let mut args = vec!["status", "--porcelain", "--untracked-files=all", "--", "."];
        let excludes: Vec<String> = self
            .excluded
            .iter()
            .map(|p| format!(":(exclude){p}"))
            .collect();
        args.extend(excludes.iter().map(String::as_str));
        self.git_stdout(&args).map(|out| !out.is_empty())
    }

    pub fn head_sha(&self) -> Option<String> {
        self.git_stdout(&["rev-parse", "HEAD"]).filter(|s| !s.is_empty())
    }

    /// Checked-out branch name; `None` on a detached HEAD.
    pub fn current_branch(&self) -> Option<String> {
        self.git_stdout(&["symbolic-ref", "--short", "-q", "HEAD"])
            .filter(|s| !s.is_empty())
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        let reference = format!("refs/heads/{name}");
        self.git_ok(&["rev-parse", "--verify", "--quiet", &reference])
    }

    /// Create and check out `name`. Refuses a dirty tree or an existing branch.
    pub fn create_fix_branch(&self, name: &str) -> bool {
        match self.is_dirty() {
            Some(false) => {}
            Some(true) => {
                warn!(branch = name, "working tree is dirty; not creating fix branch");
                return false;
            }
            None => return false,
        }
        if self.branch_exists(name) {
            warn!(branch = name, "fix branch already exists");
            return false;
        }
        let created = self.git_ok(&["checkout", "-q", "-b", name]);
        if created {
            info!(branch = name, "created fix branch");
        }
        created
    }

    /// Stage exactly the files of successful results and commit them.
    ///
    /// On any failure the files staged so far are unstaged again.
    pub fn commit_fixes(&self, results: &[FixResult], message: &str) -> bool {
        let files: BTreeSet<&str> = results
            .iter()
            .filter(|r| r.success)
            .flat_map(|r| r.files_modified.iter().map(String::as_str))
            .collect();
        self.commit_files(files, message)
    }

    /// Stage `files` (additions, edits and deletions alike) and commit them.
    ///
    /// Returns `false` when there is nothing to stage. On any failure the files staged so
    /// far are unstaged again.
    pub fn commit_files<'a>(&self, files: impl IntoIterator<Item = &'a str>, message: &str) -> bool {
        if !self.is_available() {
            return false;
        }
        let files: BTreeSet<&str> = files.into_iter().collect();
        if files.is_empty() {
            debug!("nothing to commit");
            return false;
        }

        let mut staged: Vec<&str> = Vec::new();
        for file in files.iter().copied() {
            if !self.git_ok(&["add", "-A", "--", file]) {
                warn!(file, "git add failed");
                self.unstage(&staged);
                return false;
            }
            staged.push(file);
        }

        if !self.git_ok(&["commit", "-q", "-m", message]) {
            warn!("git commit failed");
            self.unstage(&staged);
            return false;
        }
        info!(files = files.len(), "committed fixes");
        true
    }

    fn unstage(&self, files: &[&str]) {
        if files.is_empty() {
            return;
        }
        let mut args = vec!["reset", "-q", "--"];
        args.extend(files.iter().copied());
        if !self.git_ok(&args) {
            warn!(files = files.len(), "could not unstage files");
        }
    }

    pub fn switch_to_branch(&self, name: &str) -> bool {
        self.git_ok(&["checkout", "-q", name])
    }

    pub fn merge_fast_forward(&self, name: &str) -> bool {
        self.git_ok(&["merge", "-q", "--ff-only", name])
    }

    /// Force-delete `name`. Refuses the checked-out branch.
    pub fn delete_branch(&self, name: &str) -> bool {
        if self.current_branch().as_deref() == Some(name) {
            warn!(branch = name, "refusing to delete the checked-out branch");
            return false;
        }
        self.git_ok(&["branch", "-q", "-D", name])
    }

    /// Write the last commit as a patch to `out`.
    pub fn create_patch(&self, out: &Utf8Path) -> bool {
        let Some(patch) = self
            .git(&["format-patch", "-1", "HEAD", "--stdout"])
            .filter(ProcessResult::success)
        else {
            return false;
        };
        if let Some(parent) = out.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warn!(path = %out, error = %e, "could not create patch directory");
            return false;
        }
        match fs::write(out, patch.stdout) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %out, error = %e, "could not write patch");
                false
            }
        }
    }

    pub fn revert_last_commit(&self) -> bool {
        self.git_ok(&["revert", "--no-edit", "HEAD"])
    }

    /// Push the current branch with upstream tracking so a pull request can be opened.
    pub fn create_pull_request_branch(&self, base: &str) -> bool {
        let Some(current) = self.current_branch() else {
            return false;
        };
        if current == base {
            warn!(branch = %current, "current branch is the base branch");
            return false;
        }
        let Some(remote) = self
            .git_stdout(&["remote"])
            .and_then(|out| out.lines().next().map(str::to_string))
        else {
            warn!("no remote configured");
            return false;
        };
        self.git_ok(&["push", "-u", &remote, &current])
    }

    /// Record uncommitted tracked changes as a stash entry without touching the tree.
    ///
    /// Returns the stash commit, or `None` when there is nothing to stash.
    pub fn stash_create(&self, message: &str) -> Option<String> {
        let sha = self
            .git_stdout(&["stash", "create", message])
            .filter(|s| !s.is_empty())?;
        if !self.git_ok(&["stash", "store", "-q", "-m", message, &sha]) {
            return None;
        }
        Some(sha)
    }

    pub fn stash_apply(&self, reference: &str) -> bool {
        self.git_ok(&["stash", "apply", "-q", reference])
    }

    /// Drop the stash entry whose commit is `reference`.
    pub fn stash_drop(&self, reference: &str) -> bool {
        let Some(list) = self.git_stdout(&["stash", "list", "--format=%H"]) else {
            return false;
        };
        let Some(index) = list.lines().position(|l| l.trim() == reference) else {
            return false;
        };
        let entry = format!("stash@{{{index}}}");
        self.git_ok(&["stash", "drop", "-q", &entry])
    }

    pub fn reset_hard(&self) -> bool {
        self.git_ok(&["reset", "-q", "--hard", "HEAD"])
    }
}

//! The safe-fix engine: snapshot, apply, validate, then commit or roll back.

use crate::capabilities::Capabilities;
use crate::lock::SessionLock;
use crate::pipeline::panic_message;
use crate::ports::{Confirmer, FixJournal, ProjectValidator};
use crate::settings::FixSettings;
use crate::error::FixSessionError;
use auditfix_adapter_sdk::AdapterRegistry;
use auditfix_domain::{Categorizer, dedup_by_fingerprint};
use auditfix_snapshot::SnapshotManager;
use auditfix_types::fix::{FixLogRecord, FixPreview, FixReport, FixResult};
use auditfix_types::issue::Issue;
use auditfix_vcs::{FixBranch, GitManager, build_commit_message, fix_branch_name};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{error, info, info_span, warn};

/// Ports the engine talks to.
#[derive(Clone, Copy)]
pub struct FixPorts<'a> {
    pub validator: &'a dyn ProjectValidator,
    pub confirmer: &'a dyn Confirmer,
    pub journal: &'a dyn FixJournal,
}

pub struct SafeFixEngine<'a> {
    settings: &'a FixSettings,
    registry: &'a AdapterRegistry,
    snapshots: &'a SnapshotManager,
    git: &'a GitManager,
    caps: &'a Capabilities,
    ports: FixPorts<'a>,
    categorizer: Categorizer,
}

/// Why a whole attempt was abandoned.
enum AttemptFailure {
    /// Nothing was touched; every issue fails with this reason.
    Preflight(String),
    /// Fixes ran; `results` says which failed. Rolled back.
    Adapter(Vec<FixResult>),
    /// All fixes ran but the batch was rejected afterwards. Rolled back.
    Rejected { results: Vec<FixResult>, reason: String },
}

impl<'a> SafeFixEngine<'a> {
    pub fn new(
        settings: &'a FixSettings,
        registry: &'a AdapterRegistry,
        snapshots: &'a SnapshotManager,
        git: &'a GitManager,
        caps: &'a Capabilities,
        ports: FixPorts<'a>,
    ) -> Self {
        Self {
            settings,
            registry,
            snapshots,
            git,
            caps,
            ports,
            categorizer: Categorizer::builtin(),
        }
    }

    pub fn with_categorizer(mut self, categorizer: Categorizer) -> Self {
        self.categorizer = categorizer;
        self
    }

    /// Auto-fixable issues admitted by the safety level, split into (safe, risky).
    pub fn select(&self, issues: &[Issue]) -> (Vec<Issue>, Vec<Issue>) {
        let candidates = dedup_by_fingerprint(issues.iter().filter(|i| i.auto_fixable).cloned().collect());
        candidates
            .into_iter()
            .filter(|i| self.settings.level.includes(self.categorizer.classify_issue(i)))
            .partition(|i| self.categorizer.classify_issue(i).is_safe())
    }

    /// What a fix session would do, without calling any adapter's fixer.
    pub fn preview(&self, issues: &[Issue]) -> Vec<FixPreview> {
        let (safe, risky) = self.select(issues);
        safe.iter().chain(risky.iter()).map(|i| self.preview_one(i)).collect()
    }

    fn preview_one(&self, issue: &Issue) -> FixPreview {
        let adapter = self.registry.create(&issue.tool);
        let estimated_change = adapter
            .as_ref()
            .map(|a| a.describe_fix(issue))
            .unwrap_or_else(|| format!("no adapter registered for {}", issue.tool));
        let preview = adapter.as_ref().and_then(|a| a.preview(issue));
        FixPreview {
            issue: issue.clone(),
            risk_level: self.categorizer.classify_issue(issue),
            estimated_change,
            files_affected: if issue.file.is_empty() {
                vec![]
            } else {
                vec![issue.file.clone()]
            },
            reversible: true,
            preview,
        }
    }

    /// Run one fix session over `issues`.
    pub fn run(&self, issues: &[Issue]) -> Result<FixReport, FixSessionError> {
        let mut report = FixReport::new(self.settings.level, self.settings.dry_run);

        if self.settings.dry_run {
            report.previews = self.preview(issues);
            info!(previews = report.previews.len(), "dry run; nothing applied");
            report.finalize();
            self.ports.journal.write_report(&report)?;
            return Ok(report);
        }

        let _lock = SessionLock::acquire(&self.settings.state_path())?;
        let (safe, risky) = self.select(issues);
        info!(safe = safe.len(), risky = risky.len(), level = %self.settings.level, "fix session");

        if !safe.is_empty() {
            let previews: Vec<FixPreview> = safe.iter().map(|i| self.preview_one(i)).collect();
            report.summary.total_attempted += safe.len() as u64;
            if self.settings.auto_apply_safe || self.ports.confirmer.confirm_batch(&previews) {
                let summary = format!("auditfix: apply {} safe fix(es)", safe.len());
                self.attempt(&safe, &summary, &mut report);
            } else {
                info!(count = safe.len(), "safe batch declined");
                self.decline(&safe, &mut report);
            }
        }

        for issue in &risky {
            report.summary.total_attempted += 1;
            let preview = self.preview_one(issue);
            let statement = self.categorizer.risk_statement(issue);
            if self.ports.confirmer.confirm_risky(&preview, &statement) {
                let summary = format!("auditfix: fix {} at {}", issue.rule(), issue.location());
                self.attempt(std::slice::from_ref(issue), &summary, &mut report);
            } else {
                info!(issue = %issue.fingerprint, "risky fix declined");
                self.decline(std::slice::from_ref(issue), &mut report);
            }
        }

        report.finalize();
        self.ports.journal.write_report(&report)?;

        if !report.snapshots.is_empty() {
            // Unverified rollbacks are the only copy left for manual recovery.
            let protected: BTreeSet<String> = report.rollback_failures.iter().cloned().collect();
            match self
                .snapshots
                .cleanup_old_snapshots_except(self.settings.snapshot_retention, &protected)
            {
                Ok(removed) if removed > 0 => info!(removed, "old snapshots cleaned up"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "snapshot cleanup failed"),
            }
        }

        info!(
            attempted = report.summary.total_attempted,
            successful = report.summary.successful,
            failed = report.summary.failed,
            declined = report.summary.declined,
            rolled_back = report.summary.rolled_back,
            "fix session complete"
        );
        Ok(report)
    }

    /// Restore a snapshot on request.
    pub fn rollback(&self, snapshot_id: &str) -> bool {
        let restored = self.snapshots.restore_snapshot(snapshot_id);
        if restored {
            info!(snapshot = snapshot_id, "rollback complete");
        } else {
            error!(
                snapshot = snapshot_id,
                location = %self.snapshots.snapshot_dir(snapshot_id),
                "rollback failed; restore files manually from the snapshot directory"
            );
        }
        restored
    }

    fn decline(&self, issues: &[Issue], report: &mut FixReport) {
        report.summary.declined += issues.len() as u64;
        for issue in issues {
            self.log(issue, FixResult::failed(issue.clone(), "declined"), None);
        }
    }

    /// One snapshot, one branch, one validation and one commit for `issues`.
    fn attempt(&self, issues: &[Issue], summary: &str, report: &mut FixReport) {
        let span = info_span!("fix_attempt", issues = issues.len());
        let _guard = span.enter();

        let git_live = self.caps.git;
        let dirty = git_live && self.git.is_dirty() != Some(false);
        if dirty && !self.settings.allow_dirty {
            let reason = "working tree has uncommitted changes (use --allow-dirty)".to_string();
            warn!("{reason}");
            self.record_failure(issues, AttemptFailure::Preflight(reason), None, report);
            return;
        }

        let snapshot_id = match self.snapshots.create_snapshot(summary) {
            Ok(id) => id,
            Err(e) => {
                let reason = format!("snapshot failed: {e}");
                self.record_failure(issues, AttemptFailure::Preflight(reason), None, report);
                return;
            }
        };
        report.snapshots.push(snapshot_id.clone());

        let mut branch = None;
        if git_live && !dirty {
            let name = fix_branch_name(&self.settings.branch_prefix, issues);
            match FixBranch::create(self.git, &name) {
                Some(created) => {
                    report.branches.push(name);
                    branch = Some(created);
                }
                None => {
                    let reason = format!("could not create fix branch {name}");
                    self.finish_failed(issues, AttemptFailure::Preflight(reason), &snapshot_id, None, report);
                    return;
                }
            }
        }

        let results = self.apply(issues);
        if results.iter().any(|r| !r.success) {
            self.finish_failed(issues, AttemptFailure::Adapter(results), &snapshot_id, branch, report);
            return;
        }

        let changed = match self.snapshots.changed_files(&snapshot_id) {
            Ok(changed) => changed,
            Err(e) => {
                let reason = format!("could not check changed files: {e}");
                self.finish_failed(
                    issues,
                    AttemptFailure::Rejected { results, reason },
                    &snapshot_id,
                    branch,
                    report,
                );
                return;
            }
        };
        let reported: BTreeSet<&str> = results
            .iter()
            .flat_map(|r| r.files_modified.iter().map(String::as_str))
            .collect();
        let unreported: Vec<String> = changed
            .iter()
            .filter(|f| !reported.contains(f.as_str()))
            .cloned()
            .collect();
        if !unreported.is_empty() {
            warn!(files = ?unreported, "fixers changed files they did not report; including them");
        }
        // Reported files outside the snapshot patterns cannot be checked; keep them.
        let modified: Vec<String> = changed
            .iter()
            .cloned()
            .chain(
                reported
                    .iter()
                    .filter(|f| !self.snapshots.tracks(f))
                    .map(|f| f.to_string()),
            )
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if let Err(failure) = self.ports.validator.validate(&self.settings.repo_root, &modified) {
            warn!(%failure, "validation failed; rolling back");
            let reason = format!("validation failed: {failure}");
            self.finish_failed(
                issues,
                AttemptFailure::Rejected { results, reason },
                &snapshot_id,
                branch,
                report,
            );
            return;
        }

        let committed = if modified.is_empty() {
            info!("fixes left the tree unchanged; nothing to commit");
            if let Some(mut unused) = branch.take() {
                if unused.discard(self.git) {
                    report.branches.retain(|b| *b != unused.name);
                } else {
                    warn!(branch = %unused.name, "could not discard empty fix branch");
                }
            }
            true
        } else {
            let message = build_commit_message(summary, &results);
            let files = modified.iter().map(String::as_str);
            match branch.as_mut() {
                Some(branch) => branch.commit_files(self.git, files, &message),
                None if git_live => self.git.commit_files(files, &message),
                None => true,
            }
        };
        if !committed {
            let reason = "commit failed".to_string();
            self.finish_failed(
                issues,
                AttemptFailure::Rejected { results, reason },
                &snapshot_id,
                branch,
                report,
            );
            return;
        }

        if let Err(e) = self.snapshots.mark_snapshot_success(&snapshot_id) {
            warn!(snapshot = %snapshot_id, error = %e, "could not mark snapshot successful");
        }
        report.record_unreported_files(unreported);
        for result in results {
            info!(issue = %result.issue.fingerprint, files = ?result.files_modified, "fix applied");
            self.log(&result.issue, result.clone(), Some(&snapshot_id));
            report.record_applied(result);
        }
    }

    /// Run adapters per tool; exactly one result per issue, in input order.
    fn apply(&self, issues: &[Issue]) -> Vec<FixResult> {
        let mut groups: BTreeMap<&str, Vec<Issue>> = BTreeMap::new();
        for issue in issues {
            groups.entry(issue.tool.as_str()).or_default().push(issue.clone());
        }

        let mut by_fingerprint: BTreeMap<String, FixResult> = BTreeMap::new();
        for (tool, group) in groups {
            let outcome = match self.registry.create(tool) {
                None => Err(format!("no adapter registered for {tool}")),
                Some(adapter) => {
                    match catch_unwind(AssertUnwindSafe(|| {
                        adapter.auto_fix(&self.settings.repo_root, &group)
                    })) {
                        Ok(Ok(results)) => Ok(results),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(panic) => Err(format!("adapter panicked: {}", panic_message(&*panic))),
                    }
                }
            };
            match outcome {
                Ok(results) => {
                    for r in results {
                        by_fingerprint.entry(r.issue.fingerprint.clone()).or_insert(r);
                    }
                }
                Err(reason) => {
                    warn!(tool, %reason, "fixer failed");
                    for issue in group {
                        let fp = issue.fingerprint.clone();
                        by_fingerprint.insert(fp, FixResult::failed(issue, reason.clone()));
                    }
                }
            }
        }

        issues
            .iter()
            .map(|issue| {
                by_fingerprint
                    .remove(&issue.fingerprint)
                    .unwrap_or_else(|| FixResult::failed(issue.clone(), "fixer returned no result"))
            })
            .collect()
    }

    /// Restore the snapshot, drop the branch, then record the failure.
    fn finish_failed(
        &self,
        issues: &[Issue],
        failure: AttemptFailure,
        snapshot_id: &str,
        branch: Option<FixBranch>,
        report: &mut FixReport,
    ) {
        if !self.rollback(snapshot_id) {
            report.rollback_failures.push(snapshot_id.to_string());
        }
        if let Some(mut branch) = branch
            && !branch.discard(self.git)
        {
            warn!(branch = %branch.name, "could not discard fix branch");
        }
        self.record_failure(issues, failure, Some(snapshot_id), report);
    }

    fn record_failure(
        &self,
        issues: &[Issue],
        failure: AttemptFailure,
        snapshot_id: Option<&str>,
        report: &mut FixReport,
    ) {
        match failure {
            AttemptFailure::Preflight(reason) => {
                for issue in issues {
                    self.log(issue, FixResult::failed(issue.clone(), reason.clone()), snapshot_id);
                    report.record_error(issue.clone(), reason.clone(), snapshot_id);
                }
            }
            AttemptFailure::Adapter(results) => {
                for result in results {
                    if result.success {
                        self.roll_back_result(&result, snapshot_id, report);
                    } else {
                        let reason = result.reason_or_unknown().to_string();
                        self.log(&result.issue, result.clone(), snapshot_id);
                        report.record_error(result.issue, reason, snapshot_id);
                    }
                }
            }
            AttemptFailure::Rejected { results, reason } => {
                for result in results {
                    report.rolled_back.push(result.issue.fingerprint.clone());
                    report.summary.rolled_back += 1;
                    let failed = FixResult::failed(result.issue.clone(), reason.clone());
                    self.log(&result.issue, failed, snapshot_id);
                    report.record_error(result.issue, reason.clone(), snapshot_id);
                }
            }
        }
    }

    fn roll_back_result(&self, result: &FixResult, snapshot_id: Option<&str>, report: &mut FixReport) {
        report.rolled_back.push(result.issue.fingerprint.clone());
        report.summary.rolled_back += 1;
        let undone = FixResult::failed(result.issue.clone(), "rolled back with its batch");
        self.log(&result.issue, undone, snapshot_id);
    }

    fn log(&self, issue: &Issue, result: FixResult, snapshot_id: Option<&str>) {
        let record = FixLogRecord {
            timestamp: Utc::now(),
            issue: issue.clone(),
            result,
            snapshot_id: snapshot_id.map(str::to_string),
        };
        if let Err(e) = self.ports.journal.append(&record) {
            warn!(error = %e, "could not append to fixes log");
        }
    }
}

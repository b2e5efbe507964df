use crate::{CriticalFiles, SnapshotError, SnapshotResult};
use auditfix_types::snapshot::{ChecksumMismatch, SnapshotMeta, SnapshotStatus};
use auditfix_vcs::GitManager;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use diffy::PatchFormatter;
use fs_err as fs;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, warn};

const METADATA_FILE: &str = "metadata.json";
const FILES_DIR: &str = "files";
const STAGING_PREFIX: &str = ".staging-";

/// Creates, restores and prunes snapshots of one working tree.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    root: Utf8PathBuf,
    snapshots_dir: Utf8PathBuf,
    critical: CriticalFiles,
    git: Option<GitManager>,
}

impl SnapshotManager {
    /// `state_dir` is relative to `root` and is never itself snapshotted.
    pub fn new(
        root: impl Into<Utf8PathBuf>,
        state_dir: &str,
        extra_patterns: &[String],
    ) -> SnapshotResult<Self> {
        let root = root.into();
        Ok(Self {
            snapshots_dir: root.join(state_dir).join("snapshots"),
            critical: CriticalFiles::new(extra_patterns, state_dir)?,
            root,
            git: None,
        })
    }

    /// Use `git` to stash uncommitted changes on dirty repositories.
    pub fn with_git(mut self, git: GitManager) -> Self {
        self.git = Some(git);
        self
    }

    pub fn snapshots_dir(&self) -> &Utf8Path {
        &self.snapshots_dir
    }

    pub fn snapshot_dir(&self, id: &str) -> Utf8PathBuf {
        self.snapshots_dir.join(id)
    }

    fn live_git(&self) -> Option<&GitManager> {
        self.git.as_ref().filter(|g| g.is_available())
    }

    /// Back up every critical file and return the new snapshot id.
    ///
    /// The snapshot is assembled in a staging directory and renamed into place once its
    /// metadata is written. On failure nothing is left behind.
    pub fn create_snapshot(&self, description: &str) -> SnapshotResult<String> {
        let created_at = Utc::now();
        let short = uuid::Uuid::new_v4().simple().to_string();
        let id = format!("{}-{}", created_at.format("%Y%m%dT%H%M%S%3fZ"), &short[..8]);
        let staging = self.snapshots_dir.join(format!("{STAGING_PREFIX}{id}"));

        let mut meta = SnapshotMeta::new(&id, description, created_at);
        match self.assemble(&staging, &mut meta) {
            Ok(()) => {
                info!(
                    snapshot = %id,
                    files = meta.file_checksums.len(),
                    stash = meta.vcs_stash.is_some(),
                    "snapshot created"
                );
                Ok(id)
            }
            Err(e) => {
                if staging.exists() {
                    let _ = fs::remove_dir_all(&staging);
                }
                if let (Some(git), Some(stash)) = (self.live_git(), meta.vcs_stash.as_deref()) {
                    git.stash_drop(stash);
                }
                warn!(snapshot = %id, error = %e, "snapshot creation failed");
                Err(e)
            }
        }
    }

    fn assemble(&self, staging: &Utf8Path, meta: &mut SnapshotMeta) -> SnapshotResult<()> {
        let files_dir = staging.join(FILES_DIR);
        fs::create_dir_all(&files_dir)?;

        for rel in self.critical.collect(&self.root)? {
            let bytes = fs::read(self.root.join(&rel))?;
            let backup = files_dir.join(&rel);
            if let Some(parent) = backup.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&backup, &bytes)?;
            meta.file_checksums
                .insert(rel, auditfix_hash::sha256_hex(&bytes));
        }

        if let Some(git) = self.live_git() {
            meta.vcs_commit = git.head_sha();
            if git.is_dirty() == Some(true) {
                meta.vcs_stash = git.stash_create(&format!("auditfix snapshot {}", meta.id));
            }
        }

        write_metadata(staging, meta)?;
        fs::rename(staging, self.snapshot_dir(&meta.id))?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> SnapshotResult<SnapshotMeta> {
        let path = self.snapshot_dir(id).join(METADATA_FILE);
        if !path.exists() {
            return Err(SnapshotError::NotFound { id: id.to_string() });
        }
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| SnapshotError::Metadata {
            id: id.to_string(),
            message: e.to_string(),
        })
    }

    /// Restore the tree to the snapshot and verify it.
    ///
    /// Returns `false` on any failed step, any missing backup or any checksum mismatch
    /// after the restore. Never panics or errors.
    pub fn restore_snapshot(&self, id: &str) -> bool {
        let meta = match self.get(id) {
            Ok(meta) => meta,
            Err(e) => {
                error!(snapshot = %id, error = %e, "cannot restore snapshot");
                return false;
            }
        };
        let dir = self.snapshot_dir(id);
        let mut ok = true;

        if let Some(stash) = meta.vcs_stash.as_deref() {
            match self.live_git() {
                Some(git) => {
                    if !(git.reset_hard() && git.stash_apply(stash)) {
                        error!(snapshot = %id, stash, "could not re-apply stashed changes");
                        ok = false;
                    }
                }
                None => {
                    error!(snapshot = %id, stash, "snapshot has a stash but git is unavailable");
                    ok = false;
                }
            }
        }

        for rel in meta.file_checksums.keys() {
            let backup = dir.join(FILES_DIR).join(rel);
            if !backup.is_file() {
                error!(snapshot = %id, file = %rel, "backup file missing");
                ok = false;
                continue;
            }
            let target = self.root.join(rel);
            let copied = target
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::copy(&backup, &target).map(|_| ()));
            if let Err(e) = copied {
                error!(snapshot = %id, file = %rel, error = %e, "could not restore file");
                ok = false;
            }
        }

        match self.critical.collect(&self.root) {
            Ok(current) => {
                for rel in current.iter().filter(|r| !meta.file_checksums.contains_key(*r)) {
                    debug!(snapshot = %id, file = %rel, "removing file created after snapshot");
                    if let Err(e) = fs::remove_file(self.root.join(rel)) {
                        error!(snapshot = %id, file = %rel, error = %e, "could not remove new file");
                        ok = false;
                    }
                }
            }
            Err(e) => {
                error!(snapshot = %id, error = %e, "could not scan tree");
                ok = false;
            }
        }

        let mismatches = self.mismatches(&meta);
        if !mismatches.is_empty() {
            for m in &mismatches {
                error!(snapshot = %id, file = %m.path, "checksum mismatch after restore");
            }
            ok = false;
        }

        if ok {
            info!(snapshot = %id, "snapshot restored and verified");
        } else {
            error!(
                snapshot = %id,
                location = %dir,
                "rollback could not be verified; manual recovery required"
            );
        }
        ok
    }

    /// Tracked files whose current content differs from the snapshot.
    pub fn verify_snapshot(&self, id: &str) -> SnapshotResult<Vec<ChecksumMismatch>> {
        let meta = self.get(id)?;
        Ok(self.mismatches(&meta))
    }

    fn mismatches(&self, meta: &SnapshotMeta) -> Vec<ChecksumMismatch> {
        meta.file_checksums
            .iter()
            .filter_map(|(rel, expected)| {
                let actual = fs::read(self.root.join(rel))
                    .ok()
                    .map(|bytes| auditfix_hash::sha256_hex(&bytes));
                (actual.as_deref() != Some(expected.as_str())).then(|| ChecksumMismatch {
                    path: rel.clone(),
                    expected: expected.clone(),
                    actual,
                })
            })
            .collect()
    }

    /// Unified diff from the snapshot's backups to the working tree.
    pub fn diff_snapshot(&self, id: &str) -> SnapshotResult<String> {
        let meta = self.get(id)?;
        let files_dir = self.snapshot_dir(id).join(FILES_DIR);
        let formatter = PatchFormatter::new();
        let mut out = String::new();

        for rel in meta.file_checksums.keys() {
            let old = read_lossy(&files_dir.join(rel));
            let new = read_lossy(&self.root.join(rel));
            if old == new {
                continue;
            }
            out.push_str(&format!("diff --git a/{0} b/{0}\n", rel));
            out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", rel));
            let patch = diffy::create_patch(&old, &new);
            let rendered = formatter.fmt_patch(&patch).to_string();
            // Drop diffy's own original/modified header.
            let body = rendered.splitn(3, '\n').nth(2).unwrap_or_default();
            out.push_str(body);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// All readable snapshots, oldest first.
    pub fn list_snapshots(&self) -> SnapshotResult<Vec<SnapshotMeta>> {
        if !self.snapshots_dir.exists() {
            return Ok(vec![]);
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.snapshots_dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(STAGING_PREFIX) || !entry.file_type()?.is_dir() {
                continue;
            }
            match self.get(&name) {
                Ok(meta) => out.push(meta),
                Err(e) => debug!(snapshot = %name, error = %e, "skipping unreadable snapshot"),
            }
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    /// Delete the oldest snapshots beyond `keep`. Returns how many were removed.
    pub fn cleanup_old_snapshots(&self, keep: usize) -> SnapshotResult<usize> {
        self.cleanup_old_snapshots_except(keep, &BTreeSet::new())
    }

    /// Like [`cleanup_old_snapshots`](Self::cleanup_old_snapshots), but never deletes the
    /// snapshots in `protected` and does not count them against `keep`.
    pub fn cleanup_old_snapshots_except(
        &self,
        keep: usize,
        protected: &BTreeSet<String>,
    ) -> SnapshotResult<usize> {
        let candidates: Vec<SnapshotMeta> = self
            .list_snapshots()?
            .into_iter()
            .filter(|meta| !protected.contains(&meta.id))
            .collect();
        let excess = candidates.len().saturating_sub(keep);
        for meta in candidates.iter().take(excess) {
            fs::remove_dir_all(self.snapshot_dir(&meta.id))?;
            debug!(snapshot = %meta.id, "removed old snapshot");
        }
        if excess > 0 {
            info!(removed = excess, keep, protected = protected.len(), "pruned snapshots");
        }
        Ok(excess)
    }

    /// The one allowed transition: `pending -> success`.
    pub fn mark_snapshot_success(&self, id: &str) -> SnapshotResult<()> {
        let mut meta = self.get(id)?;
        if meta.is_success() {
            return Ok(());
        }
        meta.status = SnapshotStatus::Success;
        write_metadata(&self.snapshot_dir(id), &meta)?;
        if let (Some(git), Some(stash)) = (self.live_git(), meta.vcs_stash.as_deref()) {
            git.stash_drop(stash);
        }
        Ok(())
    }

    /// Checksums of the critical files as they are now.
    pub fn current_checksums(&self) -> SnapshotResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for rel in self.critical.collect(&self.root)? {
            let bytes = fs::read(self.root.join(&rel))?;
            out.insert(rel, auditfix_hash::sha256_hex(&bytes));
        }
        Ok(out)
    }

    /// Whether `rel` is covered by the critical-file patterns.
    pub fn tracks(&self, rel: &str) -> bool {
        self.critical.matches(rel)
    }

    /// Critical files edited, created or deleted since the snapshot was taken.
    pub fn changed_files(&self, id: &str) -> SnapshotResult<BTreeSet<String>> {
        let meta = self.get(id)?;
        let current = self.current_checksums()?;
        let mut changed: BTreeSet<String> = current
            .iter()
            .filter(|(rel, sum)| meta.file_checksums.get(*rel) != Some(*sum))
            .map(|(rel, _)| rel.clone())
            .collect();
        changed.extend(
            meta.file_checksums
                .keys()
                .filter(|rel| !current.contains_key(*rel))
                .cloned(),
        );
        Ok(changed)
    }
}

fn write_metadata(dir: &Utf8Path, meta: &SnapshotMeta) -> SnapshotResult<()> {
    let json = serde_json::to_vec_pretty(meta).map_err(|e| SnapshotError::Metadata {
        id: meta.id.clone(),
        message: e.to_string(),
    })?;
    let tmp = dir.join(format!("{METADATA_FILE}.tmp"));
    fs::write(&tmp, json)?;
    fs::rename(&tmp, dir.join(METADATA_FILE))?;
    Ok(())
}

fn read_lossy(path: &Utf8Path) -> String {
    fs::read(path)
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}

use auditfix_process::SystemProcessRunner;
use auditfix_snapshot::SnapshotManager;
use auditfix_types::snapshot::SnapshotStatus;
use auditfix_vcs::GitManager;
use camino::{Utf8Path, Utf8PathBuf};
use pretty_assertions::assert_eq;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

const STATE_DIR: &str = ".auditfix";

fn project() -> (TempDir, Utf8PathBuf) {
    let temp = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
    write(&root, "Cargo.toml", "[package]\nname = \"demo\"\n");
    write(&root, "src/lib.rs", "pub fn a() {}\n");
    write(&root, "src/bin/tool.rs", "fn main() {}\n");
    write(&root, "README.md", "docs\n");
    (temp, root)
}

fn write(root: &Utf8Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, contents).expect("write");
}

fn read(root: &Utf8Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).expect("read")
}

fn manager(root: &Utf8Path) -> SnapshotManager {
    SnapshotManager::new(root, STATE_DIR, &[]).expect("manager")
}

fn run_git(root: &Utf8Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(root)
        .status()
        .expect("run git");
    assert!(status.success(), "git {:?} failed", args);
}

#[test]
fn create_records_checksums_and_backups() {
    let (_temp, root) = project();
    let snapshots = manager(&root);

    let id = snapshots.create_snapshot("before fixes").expect("create");
    let meta = snapshots.get(&id).expect("meta");

    assert_eq!(meta.description, "before fixes");
    assert_eq!(meta.status, SnapshotStatus::Pending);
    assert_eq!(
        meta.file_checksums.keys().collect::<Vec<_>>(),
        vec!["Cargo.toml", "src/bin/tool.rs", "src/lib.rs"]
    );
    assert_eq!(
        meta.file_checksums["src/lib.rs"],
        auditfix_hash::sha256_hex(b"pub fn a() {}\n")
    );
    assert!(snapshots.snapshot_dir(&id).join("files/src/lib.rs").is_file());
    assert!(meta.vcs_commit.is_none());

    let leftovers: Vec<_> = std::fs::read_dir(snapshots.snapshots_dir())
        .expect("read dir")
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(".staging-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn restore_reverts_edits_and_removes_new_files() {
    let (_temp, root) = project();
    let snapshots = manager(&root);
    let id = snapshots.create_snapshot("s").expect("create");

    write(&root, "src/lib.rs", "pub fn broken( {}\n");
    std::fs::remove_file(root.join("src/bin/tool.rs")).expect("rm");
    write(&root, "src/new_module.rs", "pub fn new() {}\n");
    write(&root, "NOTES.txt", "not critical\n");

    assert!(snapshots.restore_snapshot(&id));
    assert_eq!(read(&root, "src/lib.rs"), "pub fn a() {}\n");
    assert_eq!(read(&root, "src/bin/tool.rs"), "fn main() {}\n");
    assert!(!root.join("src/new_module.rs").exists());
    assert!(root.join("NOTES.txt").exists());
    assert!(snapshots.verify_snapshot(&id).expect("verify").is_empty());
}

#[test]
fn missing_backup_makes_restore_fail() {
    let (_temp, root) = project();
    let snapshots = manager(&root);
    let id = snapshots.create_snapshot("s").expect("create");

    std::fs::remove_file(snapshots.snapshot_dir(&id).join("files/src/lib.rs")).expect("rm backup");
    write(&root, "src/lib.rs", "changed\n");

    assert!(!snapshots.restore_snapshot(&id));
    let mismatches = snapshots.verify_snapshot(&id).expect("verify");
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].path, "src/lib.rs");
}

#[test]
fn restoring_unknown_snapshot_returns_false() {
    let (_temp, root) = project();
    assert!(!manager(&root).restore_snapshot("nope"));
}

#[test]
fn verify_reports_missing_files() {
    let (_temp, root) = project();
    let snapshots = manager(&root);
    let id = snapshots.create_snapshot("s").expect("create");
    std::fs::remove_file(root.join("Cargo.toml")).expect("rm");

    let mismatches = snapshots.verify_snapshot(&id).expect("verify");
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].path, "Cargo.toml");
    assert_eq!(mismatches[0].actual, None);
}

#[test]
fn diff_shows_changes_since_snapshot() {
    let (_temp, root) = project();
    let snapshots = manager(&root);
    let id = snapshots.create_snapshot("s").expect("create");
    assert_eq!(snapshots.diff_snapshot(&id).expect("diff"), "");

    write(&root, "src/lib.rs", "pub fn b() {}\n");
    let diff = snapshots.diff_snapshot(&id).expect("diff");
    assert!(diff.starts_with("diff --git a/src/lib.rs b/src/lib.rs\n--- a/src/lib.rs\n+++ b/src/lib.rs\n"));
    assert!(diff.contains("-pub fn a() {}"));
    assert!(diff.contains("+pub fn b() {}"));
    assert!(!diff.contains("original"));
}

#[test]
fn list_cleanup_and_mark_success() {
    let (_temp, root) = project();
    let snapshots = manager(&root);
    let ids: Vec<String> = (0..4)
        .map(|i| snapshots.create_snapshot(&format!("s{i}")).expect("create"))
        .collect();

    let listed: Vec<String> = snapshots
        .list_snapshots()
        .expect("list")
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(listed, ids);

    snapshots.mark_snapshot_success(&ids[3]).expect("mark");
    assert!(snapshots.get(&ids[3]).expect("meta").is_success());

    assert_eq!(snapshots.cleanup_old_snapshots(2).expect("cleanup"), 2);
    let remaining: Vec<String> = snapshots
        .list_snapshots()
        .expect("list")
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(remaining, ids[2..].to_vec());
    assert_eq!(snapshots.cleanup_old_snapshots(5).expect("cleanup"), 0);
}

#[test]
fn dirty_repository_is_stashed_and_restored() {
    let (_temp, root) = project();
    run_git(&root, &["init", "-q", "-b", "main"]);
    run_git(&root, &["config", "user.email", "test@example.com"]);
    run_git(&root, &["config", "user.name", "Test User"]);
    run_git(&root, &["config", "commit.gpgsign", "false"]);
    run_git(&root, &["add", "."]);
    run_git(&root, &["commit", "-q", "-m", "init"]);

    // Uncommitted work outside the critical set survives a rollback via the stash.
    write(&root, "README.md", "work in progress\n");
    write(&root, "src/lib.rs", "pub fn wip() {}\n");

    let git = GitManager::new(&root, Arc::new(SystemProcessRunner::new())).exclude(STATE_DIR);
    let snapshots = manager(&root).with_git(git);
    let id = snapshots.create_snapshot("dirty").expect("create");
    let meta = snapshots.get(&id).expect("meta");
    assert!(meta.vcs_commit.is_some());
    assert!(meta.vcs_stash.is_some());
    assert_eq!(read(&root, "README.md"), "work in progress\n");

    write(&root, "README.md", "clobbered\n");
    write(&root, "src/lib.rs", "clobbered\n");

    assert!(snapshots.restore_snapshot(&id));
    assert_eq!(read(&root, "README.md"), "work in progress\n");
    assert_eq!(read(&root, "src/lib.rs"), "pub fn wip() {}\n");
}

#[test]
fn cleanup_never_removes_protected_snapshots() {
    let (_temp, root) = project();
    let snapshots = manager(&root);
    let ids: Vec<String> = (0..3)
        .map(|i| {
            std::thread::sleep(std::time::Duration::from_millis(5));
            snapshots.create_snapshot(&format!("s{i}")).expect("create")
        })
        .collect();
    let protected = std::collections::BTreeSet::from([ids[0].clone()]);

    assert_eq!(snapshots.cleanup_old_snapshots_except(1, &protected).expect("cleanup"), 1);
    let remaining: Vec<String> = snapshots
        .list_snapshots()
        .expect("list")
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(remaining, vec![ids[0].clone(), ids[2].clone()]);
}

#[test]
fn changed_files_reports_edits_additions_and_deletions() {
    let (_temp, root) = project();
    let snapshots = manager(&root);
    let id = snapshots.create_snapshot("before").expect("create");

    write(&root, "src/lib.rs", "pub fn a() {}\n// fixed\n");
    write(&root, "src/new.rs", "pub fn n() {}\n");
    write(&root, "README.md", "untracked edit\n");
    std::fs::remove_file(root.join("src/bin/tool.rs")).expect("remove");

    let changed: Vec<String> = snapshots.changed_files(&id).expect("changed").into_iter().collect();
    assert_eq!(changed, vec!["src/bin/tool.rs", "src/lib.rs", "src/new.rs"]);
    assert!(snapshots.tracks("src/lib.rs"));
    assert!(!snapshots.tracks("README.md"));
}

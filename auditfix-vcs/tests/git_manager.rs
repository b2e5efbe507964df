//! Integration tests against a real `git` binary in a scratch repository.

use auditfix_process::SystemProcessRunner;
use auditfix_types::fix::FixResult;
use auditfix_types::issue::{Issue, Severity};
use auditfix_vcs::{FixBranch, FixBranchState, GitManager};
use camino::{Utf8Path, Utf8PathBuf};
use pretty_assertions::assert_eq;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

fn run_git(root: &Utf8Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .expect("run git");
    assert!(output.status.success(), "git {:?} failed", args);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn init_repo() -> (TempDir, Utf8PathBuf) {
    let temp = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
    std::fs::create_dir_all(root.join("src")).expect("mkdir");
    std::fs::write(root.join("Cargo.toml"), "[package]\nname = \"demo\"\n").expect("write");
    std::fs::write(root.join("src/lib.rs"), "pub fn a() {}\n").expect("write");

    run_git(&root, &["init", "-q", "-b", "main"]);
    run_git(&root, &["config", "user.email", "test@example.com"]);
    run_git(&root, &["config", "user.name", "Test User"]);
    run_git(&root, &["config", "commit.gpgsign", "false"]);
    run_git(&root, &["add", "."]);
    run_git(&root, &["commit", "-q", "-m", "init"]);
    (temp, root)
}

fn manager(root: &Utf8Path) -> GitManager {
    GitManager::new(root, Arc::new(SystemProcessRunner::new())).exclude(".auditfix")
}

fn applied(file: &str) -> FixResult {
    let issue = Issue::new("rustfmt", "formatting", Severity::Low, "fmt", file);
    FixResult::applied(issue, vec![file.to_string()], format!("formatted {file}"))
}

#[test]
fn queries() {
    let (_temp, root) = init_repo();
    let git = manager(&root);

    assert!(git.is_available());
    assert_eq!(git.current_branch().as_deref(), Some("main"));
    assert_eq!(git.head_sha(), Some(run_git(&root, &["rev-parse", "HEAD"])));
    assert_eq!(git.is_dirty(), Some(false));

    std::fs::create_dir_all(root.join(".auditfix")).expect("mkdir");
    std::fs::write(root.join(".auditfix/fixes.log"), "{}\n").expect("write");
    assert_eq!(git.is_dirty(), Some(false));

    std::fs::write(root.join("src/lib.rs"), "pub fn b() {}\n").expect("write");
    assert_eq!(git.is_dirty(), Some(true));
}

#[test]
fn fix_branch_requires_clean_tree_and_new_name() {
    let (_temp, root) = init_repo();
    let git = manager(&root);

    assert!(git.create_fix_branch("auditfix/one"));
    assert_eq!(git.current_branch().as_deref(), Some("auditfix/one"));
    assert!(git.branch_exists("auditfix/one"));

    assert!(git.switch_to_branch("main"));
    assert!(!git.create_fix_branch("auditfix/one"));

    std::fs::write(root.join("src/lib.rs"), "dirty\n").expect("write");
    assert!(!git.create_fix_branch("auditfix/two"));
    assert!(!git.branch_exists("auditfix/two"));
}

#[test]
fn commit_stages_only_listed_files() {
    let (_temp, root) = init_repo();
    let git = manager(&root);

    std::fs::write(root.join("src/lib.rs"), "pub fn a() {}\n// fixed\n").expect("write");
    std::fs::write(root.join("Cargo.toml"), "[package]\nname = \"other\"\n").expect("write");

    assert!(git.commit_fixes(&[applied("src/lib.rs")], "auditfix: fmt\n\nAuditfix-Fixes: 1"));

    let changed = run_git(&root, &["show", "--name-only", "--format=", "HEAD"]);
    assert_eq!(changed, "src/lib.rs");
    let status = run_git(&root, &["status", "--porcelain"]);
    assert_eq!(status, "M Cargo.toml");
    let body = run_git(&root, &["log", "-1", "--format=%B"]);
    assert!(body.contains("Auditfix-Fixes: 1"));
}

#[test]
fn commit_files_stages_edits_and_deletions() {
    let (_temp, root) = init_repo();
    let git = manager(&root);

    std::fs::write(root.join("src/lib.rs"), "pub fn a() {}\n// fixed\n").expect("write");
    std::fs::remove_file(root.join("Cargo.toml")).expect("remove");

    assert!(git.commit_files(["Cargo.toml", "src/lib.rs"], "auditfix: tidy"));

    let changed = run_git(&root, &["show", "--name-status", "--format=", "HEAD"]);
    assert_eq!(changed, "D\tCargo.toml\nM\tsrc/lib.rs");
    assert_eq!(git.is_dirty(), Some(false));
    assert!(!git.commit_files(Vec::<&str>::new(), "empty"));
}

#[test]
fn commit_with_nothing_changed_fails_and_leaves_index_clean() {
    let (_temp, root) = init_repo();
    let git = manager(&root);

    assert!(!git.commit_fixes(&[applied("src/lib.rs")], "noop"));
    assert_eq!(run_git(&root, &["diff", "--cached", "--name-only"]), "");
}

#[test]
fn delete_refuses_current_branch() {
    let (_temp, root) = init_repo();
    let git = manager(&root);
    assert!(git.create_fix_branch("auditfix/x"));
    assert!(!git.delete_branch("auditfix/x"));
    assert!(git.switch_to_branch("main"));
    assert!(git.delete_branch("auditfix/x"));
    assert!(!git.branch_exists("auditfix/x"));
}

#[test]
fn stash_create_does_not_touch_tree() {
    let (_temp, root) = init_repo();
    let git = manager(&root);

    assert_eq!(git.stash_create("clean"), None);

    std::fs::write(root.join("src/lib.rs"), "pub fn wip() {}\n").expect("write");
    let stash = git.stash_create("auditfix snapshot").expect("stash ref");
    assert_eq!(
        std::fs::read_to_string(root.join("src/lib.rs")).expect("read"),
        "pub fn wip() {}\n"
    );

    std::fs::write(root.join("src/lib.rs"), "pub fn broken(\n").expect("write");
    assert!(git.reset_hard());
    assert!(git.stash_apply(&stash));
    assert_eq!(
        std::fs::read_to_string(root.join("src/lib.rs")).expect("read"),
        "pub fn wip() {}\n"
    );

    assert!(git.stash_drop(&stash));
    assert!(!git.stash_drop(&stash));
}

#[test]
fn patch_and_revert() {
    let (_temp, root) = init_repo();
    let git = manager(&root);
    std::fs::write(root.join("src/lib.rs"), "pub fn a() {}\npub fn b() {}\n").expect("write");
    assert!(git.commit_fixes(&[applied("src/lib.rs")], "add b"));

    let patch = root.join("out/fix.patch");
    assert!(git.create_patch(&patch));
    assert!(std::fs::read_to_string(&patch).expect("read").contains("+pub fn b() {}"));

    assert!(git.revert_last_commit());
    assert_eq!(
        std::fs::read_to_string(root.join("src/lib.rs")).expect("read"),
        "pub fn a() {}\n"
    );
}

#[test]
fn pull_request_branch_needs_remote_and_non_base() {
    let (_temp, root) = init_repo();
    let git = manager(&root);
    assert!(!git.create_pull_request_branch("main"));
    assert!(git.create_fix_branch("auditfix/pr"));
    assert!(!git.create_pull_request_branch("main"));
}

#[test]
fn fix_branch_lifecycle() {
    let (_temp, root) = init_repo();
    let git = manager(&root);

    let mut discarded = FixBranch::create(&git, "auditfix/discard").expect("create");
    assert_eq!(discarded.base.as_deref(), Some("main"));
    assert!(discarded.discard(&git));
    assert_eq!(discarded.state, FixBranchState::Discarded);
    assert_eq!(git.current_branch().as_deref(), Some("main"));
    assert!(!git.branch_exists("auditfix/discard"));

    let mut merged = FixBranch::create(&git, "auditfix/merge").expect("create");
    std::fs::write(root.join("src/lib.rs"), "pub fn merged() {}\n").expect("write");
    assert!(merged.commit(&git, "auditfix: merge me", &[applied("src/lib.rs")]));
    assert_eq!(merged.state, FixBranchState::Committed);
    assert!(merged.merge(&git));
    assert_eq!(merged.state, FixBranchState::Merged);
    assert_eq!(git.current_branch().as_deref(), Some("main"));
    assert!(run_git(&root, &["log", "-1", "--format=%B"]).contains("Auditfix-Fingerprints:"));
}

#[test]
fn outside_repository_everything_is_a_noop() {
    let temp = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
    let git = manager(&root);
    assert!(!git.is_available());
    assert!(!git.commit_fixes(&[applied("src/lib.rs")], "m"));
    assert!(!git.reset_hard());
    assert!(FixBranch::create(&git, "auditfix/x").is_none());
}

//! End-to-end CLI tests against scratch projects.
//!
//! Sensors are configured as `sh -c` snippets so the tests need no analyzer installed.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn auditfix() -> Command {
    Command::cargo_bin("auditfix").expect("auditfix binary")
}

fn create_temp_project() -> TempDir {
    let td = tempfile::tempdir().expect("tempdir");
    let root = td.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(
        root.join("Cargo.toml"),
        "[package]\nname = \"demo\"\nversion = \"0.1.0\"\nedition = \"2024\"\n",
    )
    .unwrap();
    fs::write(root.join("src/lib.rs"), "pub fn demo() {}\n").unwrap();
    td
}

fn write_config(root: &Path, contents: &str) {
    fs::write(root.join("auditfix.toml"), contents).unwrap();
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read json")).expect("parse json")
}

const SENSOR_CRITICAL: &str = r#"
[tools.cargo-audit]
program = "sh"
args = ["-c", "echo '[{\"severity\":\"critical\",\"check_id\":\"RUSTSEC-2024-0001\",\"message\":\"vulnerable crate\",\"location\":{\"path\":\"Cargo.lock\"}}]'"]
probe_args = ["-c", "true"]

[tools.clippy]
program = "sh"
args = ["-c", "echo '[]'"]
probe_args = ["-c", "true"]
"#;

const SENSOR_FORMAT: &str = r#"
[tools.rustfmt]
program = "sh"
args = ["-c", "echo '{\"findings\":[{\"severity\":\"low\",\"check_id\":\"formatting\",\"message\":\"bad indent\",\"location\":{\"path\":\"src/lib.rs\",\"line\":1},\"fixable\":true}]}'"]
fix_args = ["-c", "printf '// formatted\\n' >> \"$0\""]
probe_args = ["-c", "true"]

[validation]
enabled = false
"#;

#[test]
fn test_help_lists_subcommands() {
    auditfix()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("audit"))
        .stdout(predicate::str::contains("fix"))
        .stdout(predicate::str::contains("snapshots"));
}

#[test]
fn test_audit_without_sensors_skips_every_phase() {
    let temp = create_temp_project();

    auditfix()
        .current_dir(temp.path())
        .arg("audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("Audit score: 100/100"));

    let run = read_json(&temp.path().join(".auditfix/audit.json"));
    assert_eq!(run["phases"].as_array().map(Vec::len), Some(0));
    assert_eq!(run["skipped"].as_array().map(Vec::len), Some(5));
    assert_eq!(run["score"]["global"], 100);
}

#[test]
fn test_audit_critical_finding_exits_2() {
    let temp = create_temp_project();
    write_config(temp.path(), SENSOR_CRITICAL);

    auditfix()
        .current_dir(temp.path())
        .args(["audit", "--out", "run.json"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Stopped early"));

    let run = read_json(&temp.path().join("run.json"));
    assert_eq!(run["stopped_early"], true);
    assert_eq!(run["score"]["global"], 80);
    let phases: Vec<&str> = run["phases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["phase"].as_str().unwrap())
        .collect();
    assert_eq!(phases, vec!["security"]);
}

#[test]
fn test_audit_skip_flag_extends_config() {
    let temp = create_temp_project();
    write_config(temp.path(), &format!("{SENSOR_CRITICAL}\n[audit]\nskip = [\"tests\"]\n"));

    auditfix()
        .current_dir(temp.path())
        .args(["audit", "--skip", "security"])
        .assert()
        .success();

    let run = read_json(&temp.path().join(".auditfix/audit.json"));
    assert_eq!(run["stopped_early"], false);
    let lint = run["phases"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["phase"] == "lint")
        .expect("lint ran");
    assert_eq!(lint["tools_run"], serde_json::json!(["clippy"]));
}

#[test]
fn test_audit_failing_tool_exits_1() {
    let temp = create_temp_project();
    write_config(
        temp.path(),
        r#"
[tools.clippy]
program = "sh"
args = ["-c", "echo broken >&2; exit 101"]
probe_args = ["-c", "true"]
"#,
    );

    auditfix()
        .current_dir(temp.path())
        .arg("audit")
        .assert()
        .code(1);

    let run = read_json(&temp.path().join(".auditfix/audit.json"));
    let lint = &run["phases"][0];
    assert_eq!(lint["tool_failures"][0]["tool"], "clippy");
}

#[test]
fn test_invalid_level_is_rejected() {
    let temp = create_temp_project();

    auditfix()
        .current_dir(temp.path())
        .args(["fix", "--level", "reckless"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown safety level"));
}

#[test]
fn test_fix_dry_run_previews_without_changes() {
    let temp = create_temp_project();
    write_config(temp.path(), SENSOR_FORMAT);

    for _ in 0..2 {
        auditfix()
            .current_dir(temp.path())
            .args(["fix", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Dry run: 1 fix(es)"));
    }

    assert_eq!(
        fs::read_to_string(temp.path().join("src/lib.rs")).unwrap(),
        "pub fn demo() {}\n"
    );
    assert!(!temp.path().join(".auditfix/snapshots").exists());
    let report = read_json(&temp.path().join(".auditfix/fixes-report.json"));
    assert_eq!(report["dry_run"], true);
}

#[test]
fn test_fix_applies_safe_batch_and_rollback_restores_it() {
    let temp = create_temp_project();
    write_config(temp.path(), SENSOR_FORMAT);

    auditfix()
        .current_dir(temp.path())
        .args(["fix", "--auto-apply-safe"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 applied"));

    assert_eq!(
        fs::read_to_string(temp.path().join("src/lib.rs")).unwrap(),
        "pub fn demo() {}\n// formatted\n"
    );
    let report = read_json(&temp.path().join(".auditfix/fixes-report.json"));
    let snapshot = report["snapshots"][0].as_str().expect("snapshot id").to_string();
    let log = fs::read_to_string(temp.path().join(".auditfix/fixes.log")).unwrap();
    assert_eq!(log.lines().count(), 1);

    auditfix()
        .current_dir(temp.path())
        .args(["snapshots", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(snapshot.as_str()))
        .stdout(predicate::str::contains("success"));

    auditfix()
        .current_dir(temp.path())
        .args(["fix", "--rollback", &snapshot])
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(temp.path().join("src/lib.rs")).unwrap(),
        "pub fn demo() {}\n"
    );
}

#[test]
fn test_rollback_of_unknown_snapshot_exits_1() {
    let temp = create_temp_project();

    auditfix()
        .current_dir(temp.path())
        .args(["fix", "--rollback", "20240101T000000000Z-deadbeef"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("recover manually"));
}

#[test]
fn test_snapshots_cleanup_on_empty_state() {
    let temp = create_temp_project();

    auditfix()
        .current_dir(temp.path())
        .args(["snapshots", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No snapshots."));

    auditfix()
        .current_dir(temp.path())
        .args(["snapshots", "cleanup", "--keep", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 snapshot(s)"));
}

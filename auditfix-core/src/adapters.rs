//! Default implementations of the engine ports.

use crate::error::{ValidationFailure, ValidationStage};
use crate::ports::{Confirmer, FixJournal, ProjectValidator};
use anyhow::Context;
use auditfix_process::{CommandSpec, ProcessRunner};
use auditfix_types::fix::{FixLogRecord, FixPreview, FixReport};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

pub const FIXES_LOG: &str = "fixes.log";
pub const FIXES_REPORT: &str = "fixes-report.json";

/// Fixes log and report under the state directory.
#[derive(Debug, Clone)]
pub struct FsFixJournal {
    pub state_dir: Utf8PathBuf,
}

impl FsFixJournal {
    pub fn new(state_dir: Utf8PathBuf) -> Self {
        Self { state_dir }
    }

    pub fn log_path(&self) -> Utf8PathBuf {
        self.state_dir.join(FIXES_LOG)
    }

    pub fn report_path(&self) -> Utf8PathBuf {
        self.state_dir.join(FIXES_REPORT)
    }
}

impl FixJournal for FsFixJournal {
    fn append(&self, record: &FixLogRecord) -> anyhow::Result<()> {
        fs::create_dir_all(&self.state_dir)
            .with_context(|| format!("create {}", self.state_dir))?;
        let line = serde_json::to_string(record).context("serialize fix log record")?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        writeln!(file, "{line}").with_context(|| format!("append {}", self.log_path()))
    }

    fn write_report(&self, report: &FixReport) -> anyhow::Result<()> {
        fs::create_dir_all(&self.state_dir)
            .with_context(|| format!("create {}", self.state_dir))?;
        let json = serde_json::to_string_pretty(report).context("serialize fixes report")?;
        let tmp = self.state_dir.join(format!("{FIXES_REPORT}.tmp"));
        fs::write(&tmp, json).with_context(|| format!("write {tmp}"))?;
        fs::rename(&tmp, self.report_path())
            .with_context(|| format!("replace {}", self.report_path()))
    }
}

/// In-memory journal for embedding and testing.
#[derive(Debug, Default)]
pub struct InMemoryFixJournal {
    records: Mutex<Vec<FixLogRecord>>,
    report: Mutex<Option<FixReport>>,
}

impl InMemoryFixJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<FixLogRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn report(&self) -> Option<FixReport> {
        self.report.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl FixJournal for InMemoryFixJournal {
    fn append(&self, record: &FixLogRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }

    fn write_report(&self, report: &FixReport) -> anyhow::Result<()> {
        *self.report.lock().unwrap_or_else(|e| e.into_inner()) = Some(report.clone());
        Ok(())
    }
}

/// Fixed answers; used for `--auto-apply-safe` style runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirmer {
    pub batch: bool,
    pub risky: bool,
}

impl AutoConfirmer {
    pub fn yes() -> Self {
        Self {
            batch: true,
            risky: true,
        }
    }

    pub fn no() -> Self {
        Self {
            batch: false,
            risky: false,
        }
    }
}

impl Confirmer for AutoConfirmer {
    fn confirm_batch(&self, _previews: &[FixPreview]) -> bool {
        self.batch
    }

    fn confirm_risky(&self, _preview: &FixPreview, _risk_statement: &str) -> bool {
        self.risky
    }
}

/// Interactive prompts on stderr/stdin. Anything but `y`/`yes` is a no.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmer;

impl StdinConfirmer {
    fn ask(question: &str) -> bool {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "{question} [y/N] ");
        let _ = stderr.flush();
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

impl Confirmer for StdinConfirmer {
    fn confirm_batch(&self, previews: &[FixPreview]) -> bool {
        eprintln!("{} safe fix(es) ready:", previews.len());
        for p in previews {
            eprintln!("  - [{}] {} ({})", p.issue.tool, p.estimated_change, p.issue.location());
        }
        Self::ask("Apply all safe fixes?")
    }

    fn confirm_risky(&self, preview: &FixPreview, risk_statement: &str) -> bool {
        let issue = &preview.issue;
        eprintln!("Risky fix from {}: {}", issue.tool, issue.message);
        eprintln!("  at {}", issue.location());
        eprintln!("  risk: {risk_statement}");
        if let Some(p) = &preview.preview {
            eprintln!("  change: {p}");
        }
        Self::ask("Apply this fix?")
    }
}

/// Validation that always passes, for `[validation] enabled = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValidation;

impl ProjectValidator for NoValidation {
    fn validate(&self, _root: &Utf8Path, _modified: &[String]) -> Result<(), ValidationFailure> {
        Ok(())
    }
}

/// Syntax check of modified files, then a smoke command, then tagged tests.
pub struct CommandValidator {
    runner: Arc<dyn ProcessRunner>,
    smoke: Vec<String>,
    tests: Vec<String>,
    test_filter: Option<String>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for CommandValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandValidator")
            .field("smoke", &self.smoke)
            .field("tests", &self.tests)
            .field("test_filter", &self.test_filter)
            .finish()
    }
}

impl CommandValidator {
    /// An empty `smoke` or `tests` command disables that stage.
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        smoke: Vec<String>,
        tests: Vec<String>,
        test_filter: Option<String>,
    ) -> Self {
        Self {
            runner,
            smoke,
            tests,
            test_filter,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn check_syntax(&self, root: &Utf8Path, rel: &str) -> Result<(), ValidationFailure> {
        let path = root.join(rel);
        let fail = |reason: String| ValidationFailure {
            stage: ValidationStage::Syntax,
            reason: format!("{rel}: {reason}"),
        };
        if !path.is_file() {
            return Ok(());
        }
        match path.extension() {
            Some("toml") => {
                let raw = fs::read_to_string(&path).map_err(|e| fail(e.to_string()))?;
                toml::from_str::<toml::Table>(&raw).map_err(|e| fail(e.to_string()))?;
            }
            Some("json") => {
                let raw = fs::read_to_string(&path).map_err(|e| fail(e.to_string()))?;
                serde_json::from_str::<serde_json::Value>(&raw).map_err(|e| fail(e.to_string()))?;
            }
            Some("rs") => {
                let spec = CommandSpec::new("rustfmt")
                    .args(["--edition", "2024", "--emit", "stdout", "--quiet"])
                    .arg(path.as_str())
                    .current_dir(root)
                    .timeout(self.timeout);
                match self.runner.run(&spec) {
                    Ok(result) if !result.success() => return Err(fail(result.failure_reason())),
                    Ok(_) => {}
                    Err(e) => debug!(file = rel, error = %e, "rustfmt unavailable; skipping syntax check"),
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn run_stage(
        &self,
        root: &Utf8Path,
        stage: ValidationStage,
        argv: &[String],
        extra: Option<&str>,
    ) -> Result<(), ValidationFailure> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };
        let mut spec = CommandSpec::new(program)
            .args(args.iter().cloned())
            .current_dir(root)
            .timeout(self.timeout);
        if let Some(extra) = extra {
            spec = spec.arg(extra);
        }
        info!(stage = %stage, command = %spec.display(), "validating");
        let result = self.runner.run(&spec).map_err(|e| ValidationFailure {
            stage,
            reason: format!("{e:#}"),
        })?;
        if !result.success() {
            return Err(ValidationFailure {
                stage,
                reason: result.failure_reason(),
            });
        }
        Ok(())
    }
}

impl ProjectValidator for CommandValidator {
    fn validate(&self, root: &Utf8Path, modified: &[String]) -> Result<(), ValidationFailure> {
        for rel in modified {
            self.check_syntax(root, rel)?;
        }
        self.run_stage(root, ValidationStage::Smoke, &self.smoke, None)?;
        if root.join("tests").is_dir() {
            self.run_stage(
                root,
                ValidationStage::Tests,
                &self.tests,
                self.test_filter.as_deref(),
            )?;
        }
        Ok(())
    }
}

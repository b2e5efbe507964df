use crate::{Adapter, AdapterError, parse_findings};
use auditfix_process::{CommandSpec, ProcessResult, ProcessRunner};
use auditfix_types::fix::FixResult;
use auditfix_types::issue::Issue;
use camino::Utf8Path;
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How to invoke one analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub program: String,

    /// Arguments for the read-only audit run; stdout must be a findings document.
    #[serde(default)]
    pub args: Vec<String>,

    /// Arguments for the fix run; affected files are appended. Empty means no fixer.
    #[serde(default)]
    pub fix_args: Vec<String>,

    /// Arguments for the availability probe.
    #[serde(default = "default_probe_args")]
    pub probe_args: Vec<String>,
}

fn default_probe_args() -> Vec<String> {
    vec!["--version".to_string()]
}

impl ToolSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            fix_args: vec![],
            probe_args: default_probe_args(),
        }
    }

    /// Default spec for a cataloged tool: an `auditfix-<tool>` sensor on `PATH` that prints
    /// findings and accepts `--fix <files>`.
    pub fn sensor(tool: &str) -> Self {
        Self {
            fix_args: vec!["--fix".to_string()],
            ..Self::new(format!("auditfix-{tool}"))
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fix_args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Generic adapter that shells out through a [`ProcessRunner`].
pub struct CommandAdapter {
    tool: String,
    spec: ToolSpec,
    runner: Arc<dyn ProcessRunner>,
    timeout: Option<Duration>,
}

impl CommandAdapter {
    pub fn new(tool: impl Into<String>, spec: ToolSpec, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            tool: tool.into(),
            spec,
            runner,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn run(&self, root: &Utf8Path, args: &[String]) -> Result<ProcessResult, AdapterError> {
        let cmd = CommandSpec::new(&self.spec.program)
            .args(args.iter().cloned())
            .current_dir(root)
            .timeout(self.timeout);
        let result = self.runner.run(&cmd).map_err(|e| AdapterError::Spawn {
            tool: self.tool.clone(),
            message: format!("{e:#}"),
        })?;
        if result.timed_out {
            return Err(AdapterError::Timeout {
                tool: self.tool.clone(),
                duration_ms: result.duration_ms,
            });
        }
        Ok(result)
    }
}

impl Adapter for CommandAdapter {
    fn tool(&self) -> &str {
        &self.tool
    }

    fn is_available(&self) -> bool {
        let cmd = CommandSpec::new(&self.spec.program).args(self.spec.probe_args.iter().cloned());
        match self.runner.run(&cmd) {
            Ok(result) => result.success(),
            Err(e) => {
                debug!(tool = %self.tool, error = %e, "probe failed");
                false
            }
        }
    }

    fn audit(&self, root: &Utf8Path) -> Result<Vec<Issue>, AdapterError> {
        let result = self.run(root, &self.spec.args)?;
        if !result.success() && result.stdout.trim().is_empty() {
            return Err(AdapterError::Failed {
                tool: self.tool.clone(),
                reason: result.failure_reason(),
            });
        }
        if !result.success() {
            debug!(tool = %self.tool, exit = ?result.exit_code, "non-zero exit with findings");
        }
        parse_findings(&self.tool, &result.stdout)
    }

    fn auto_fix(&self, root: &Utf8Path, issues: &[Issue]) -> Result<Vec<FixResult>, AdapterError> {
        if self.spec.fix_args.is_empty() {
            return Ok(issues
                .iter()
                .map(|i| FixResult::failed(i.clone(), format!("{} has no fix command", self.tool)))
                .collect());
        }

        let files: BTreeSet<&str> = issues
            .iter()
            .map(|i| i.file.as_str())
            .filter(|f| !f.is_empty())
            .collect();
        let before = checksums(root, &files);

        let mut args = self.spec.fix_args.clone();
        args.extend(files.iter().map(|f| f.to_string()));
        let result = self.run(root, &args)?;

        if !result.success() {
            let reason = result.failure_reason();
            warn!(tool = %self.tool, %reason, "fix command failed");
            return Ok(issues
                .iter()
                .map(|i| FixResult::failed(i.clone(), reason.clone()))
                .collect());
        }

        let after = checksums(root, &files);
        let changed: BTreeSet<&str> = files
            .iter()
            .copied()
            .filter(|f| before.get(*f) != after.get(*f))
            .collect();

        Ok(issues
            .iter()
            .map(|issue| {
                if changed.contains(issue.file.as_str()) {
                    FixResult::applied(
                        issue.clone(),
                        vec![issue.file.clone()],
                        self.describe_fix(issue),
                    )
                } else {
                    FixResult::failed(
                        issue.clone(),
                        format!("fix command left {} unchanged", issue.location()),
                    )
                }
            })
            .collect())
    }

    fn preview(&self, issue: &Issue) -> Option<String> {
        let mut args = self.spec.fix_args.clone();
        if args.is_empty() {
            return None;
        }
        args.push(issue.file.clone());
        Some(format!("{} {}", self.spec.program, args.join(" ")))
    }
}

/// sha256 per existing file; missing files are absent from the map.
fn checksums(root: &Utf8Path, files: &BTreeSet<&str>) -> BTreeMap<String, String> {
    files
        .iter()
        .filter_map(|f| {
            fs::read(root.join(f))
                .ok()
                .map(|bytes| (f.to_string(), auditfix_hash::sha256_hex(&bytes)))
        })
        .collect()
}

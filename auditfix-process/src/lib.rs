//! Process execution port.
//!
//! Every external invocation in auditfix (analyzers, `git`, validation commands) goes through
//! [`ProcessRunner`], which returns a typed [`ProcessResult`] instead of leaving callers to
//! poke at exit statuses. [`SystemProcessRunner`] spawns real processes;
//! [`ScriptedProcessRunner`] is an in-memory fake for tests and embedding.
//!
//! `Err` from [`ProcessRunner::run`] means the process could not be started at all. A process
//! that ran and exited non-zero is an `Ok` result with `exit_code != Some(0)`.

mod scripted;
mod system;

pub use scripted::ScriptedProcessRunner;
pub use system::SystemProcessRunner;

use camino::Utf8PathBuf;
use std::time::Duration;

/// A command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<Utf8PathBuf>,
    pub env: Vec<(String, String)>,

    /// Kill the process after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            cwd: None,
            env: vec![],
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured outcome of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// `None` when the process was killed by a signal or by the timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Short human-readable failure reason.
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            return format!("timed out after {} ms", self.duration_ms);
        }
        let detail = self
            .stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("no output");
        match self.exit_code {
            Some(code) => format!("exit status {code}: {detail}"),
            None => format!("terminated by signal: {detail}"),
        }
    }
}

/// Runs external commands.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> anyhow::Result<ProcessResult>;
}

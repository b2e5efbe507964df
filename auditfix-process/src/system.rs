use crate::{CommandSpec, ProcessResult, ProcessRunner};
use anyhow::Context;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Spawns real processes with `std::process::Command`.
///
/// Output is drained on reader threads so a chatty child cannot block on a full pipe
/// while we wait for it.
#[derive(Debug, Clone, Default)]
pub struct SystemProcessRunner {
    /// Applied to commands that do not set their own timeout.
    pub default_timeout: Option<Duration>,
}

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_timeout(timeout: Option<Duration>) -> Self {
        Self {
            default_timeout: timeout,
        }
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, spec: &CommandSpec) -> anyhow::Result<ProcessResult> {
        let start = Instant::now();
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        debug!(command = %spec.display(), "spawning");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {}", spec.display()))?;

        let stdout = child.stdout.take().context("capture stdout")?;
        let stderr = child.stderr.take().context("capture stderr")?;
        let out_reader = spawn_reader(stdout);
        let err_reader = spawn_reader(stderr);

        let timeout = spec.timeout.or(self.default_timeout);
        let mut timed_out = false;
        let status = match timeout {
            None => child.wait().with_context(|| format!("wait {}", spec.display()))?,
            Some(limit) => loop {
                if let Some(status) = child
                    .try_wait()
                    .with_context(|| format!("poll {}", spec.display()))?
                {
                    break status;
                }
                if start.elapsed() >= limit {
                    warn!(command = %spec.display(), timeout_ms = limit.as_millis() as u64, "killing timed out process");
                    let _ = child.kill();
                    timed_out = true;
                    break child.wait().with_context(|| format!("reap {}", spec.display()))?;
                }
                thread::sleep(POLL_INTERVAL);
            },
        };

        let stdout = out_reader.join().unwrap_or_default();
        let stderr = err_reader.join().unwrap_or_default();

        Ok(ProcessResult {
            exit_code: if timed_out { None } else { status.code() },
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
            timed_out,
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut input: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = input.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let runner = SystemProcessRunner::new();
        let result = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo hello; echo oops >&2; exit 3"]))
            .expect("run sh");
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.stderr.trim(), "oops");
        assert!(!result.success());
    }

    #[test]
    fn runs_in_requested_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = camino::Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        std::fs::write(dir.join("marker.txt"), "x").expect("write");

        let result = SystemProcessRunner::new()
            .run(&CommandSpec::new("ls").current_dir(dir))
            .expect("run ls");
        assert!(result.success());
        assert!(result.stdout.contains("marker.txt"));
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = SystemProcessRunner::new()
            .run(&CommandSpec::new("auditfix-definitely-not-installed"))
            .expect_err("spawn should fail");
        assert!(err.to_string().contains("spawn"));
    }

    #[test]
    fn timeout_kills_the_child() {
        let runner = SystemProcessRunner::new();
        let result = runner
            .run(
                &CommandSpec::new("sleep")
                    .arg("5")
                    .timeout(Some(Duration::from_millis(100))),
            )
            .expect("run sleep");
        assert!(result.timed_out);
        assert_eq!(result.exit_code, None);
        assert!(result.duration_ms < 5000);
    }

    #[test]
    fn no_timeout_by_default() {
        let runner = SystemProcessRunner::new();
        let result = runner
            .run(&CommandSpec::new("sh").args(["-c", "sleep 0.2; echo done"]))
            .expect("run sh");
        assert!(result.success());
        assert!(!result.timed_out);
    }
}

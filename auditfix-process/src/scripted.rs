use crate::{CommandSpec, ProcessResult, ProcessRunner};
use std::sync::{Arc, Mutex};

type Responder = Arc<dyn Fn(&CommandSpec) -> anyhow::Result<ProcessResult> + Send + Sync>;

struct Rule {
    program: String,
    args_prefix: Vec<String>,
    respond: Responder,
}

impl Rule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        self.program == spec.program && spec.args.starts_with(&self.args_prefix)
    }
}

/// In-memory [`ProcessRunner`] for embedding and testing.
///
/// Rules match on program name plus an argument prefix; the most recently added matching
/// rule wins, so tests can override a general rule with a narrower one. Unmatched commands
/// fail as if the program were not installed. Every invocation is recorded.
#[derive(Default)]
pub struct ScriptedProcessRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `program <args_prefix...>` with a fixed result.
    pub fn on(&self, program: &str, args_prefix: &[&str], result: ProcessResult) -> &Self {
        self.on_with(program, args_prefix, move |_| Ok(result.clone()))
    }

    /// Answer `program <args_prefix...>` by calling `respond`, which may touch the filesystem.
    pub fn on_with<F>(&self, program: &str, args_prefix: &[&str], respond: F) -> &Self
    where
        F: Fn(&CommandSpec) -> anyhow::Result<ProcessResult> + Send + Sync + 'static,
    {
        let rule = Rule {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|s| s.to_string()).collect(),
            respond: Arc::new(respond),
        };
        self.rules.lock().unwrap_or_else(|e| e.into_inner()).push(rule);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Recorded invocations rendered with [`CommandSpec::display`].
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }
}

impl ProcessRunner for ScriptedProcessRunner {
    fn run(&self, spec: &CommandSpec) -> anyhow::Result<ProcessResult> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.clone());

        let respond = {
            let rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
            rules
                .iter()
                .rev()
                .find(|r| r.matches(spec))
                .map(|r| Arc::clone(&r.respond))
        };

        match respond {
            Some(respond) => respond(spec),
            None => anyhow::bail!("spawn {}: no such program (unscripted)", spec.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_matching_rule_wins() {
        let runner = ScriptedProcessRunner::new();
        runner.on("git", &[], ProcessResult::ok("general"));
        runner.on("git", &["status"], ProcessResult::ok("specific"));

        let status = runner
            .run(&CommandSpec::new("git").args(["status", "--porcelain"]))
            .expect("status");
        assert_eq!(status.stdout, "specific");

        let log = runner.run(&CommandSpec::new("git").arg("log")).expect("log");
        assert_eq!(log.stdout, "general");
    }

    #[test]
    fn unscripted_command_fails_like_missing_program() {
        let runner = ScriptedProcessRunner::new();
        let err = runner.run(&CommandSpec::new("clippy")).expect_err("unscripted");
        assert!(err.to_string().contains("unscripted"));
        assert_eq!(runner.call_lines(), vec!["clippy"]);
    }

    #[test]
    fn dynamic_responder_sees_the_spec() {
        let runner = ScriptedProcessRunner::new();
        runner.on_with("echo", &[], |spec| Ok(ProcessResult::ok(spec.args.join(","))));
        let result = runner
            .run(&CommandSpec::new("echo").args(["a", "b"]))
            .expect("echo");
        assert_eq!(result.stdout, "a,b");
    }
}

use crate::issue::Issue;
use serde::{Deserialize, Serialize};

/// A named, priority-ordered group of analyzer tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub display_name: String,
    pub tools: Vec<String>,

    #[serde(default)]
    pub parallel: bool,

    #[serde(default)]
    pub stop_on_critical: bool,

    pub priority: u32,
}

impl Phase {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            tools: vec![],
            parallel: false,
            stop_on_critical: false,
            priority,
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn stop_on_critical(mut self) -> Self {
        self.stop_on_critical = true;
        self
    }
}

/// Outcome of running one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: String,
    pub tools_run: Vec<String>,
    pub duration_ms: u64,

    #[serde(default)]
    pub issues: Vec<Issue>,

    /// Adapter failures absorbed while running this phase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_failures: Vec<ToolFailure>,
}

impl PhaseResult {
    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity.is_critical())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub tool: String,
    pub reason: String,
}

/// A phase that was not run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPhase {
    pub phase: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Removed by `only` / `skip`.
    Filtered,
    /// None of the phase's tools is available.
    NoAvailableTools,
}

use auditfix_adapter_sdk::AdapterRegistry;
use auditfix_vcs::GitManager;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// What can run in this environment. Probed once per process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Tools whose adapter reported itself available.
    pub tools: BTreeSet<String>,
    /// The repository root holds git metadata.
    pub git: bool,
}

impl Capabilities {
    /// Probe every tool in `tools`. Tools without a registered adapter are unavailable.
    pub fn probe<'a>(
        registry: &AdapterRegistry,
        tools: impl IntoIterator<Item = &'a str>,
        git: &GitManager,
    ) -> Self {
        let mut available = BTreeSet::new();
        for tool in tools {
            let ok = registry.create(tool).is_some_and(|a| a.is_available());
            debug!(tool, available = ok, "probed tool");
            if ok {
                available.insert(tool.to_string());
            }
        }
        let caps = Self {
            tools: available,
            git: git.is_available(),
        };
        info!(tools = caps.tools.len(), git = caps.git, "capabilities probed");
        caps
    }

    /// Probe only the repository, for sessions that never run an analyzer.
    pub fn probe_git(git: &GitManager) -> Self {
        let caps = Self {
            tools: BTreeSet::new(),
            git: git.is_available(),
        };
        debug!(git = caps.git, "probed repository");
        caps
    }

    pub fn from_tools<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
            git: false,
        }
    }

    pub fn has_tool(&self, tool: &str) -> bool {
        self.tools.contains(tool)
    }
}

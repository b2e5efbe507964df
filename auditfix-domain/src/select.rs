use auditfix_types::phase::{Phase, SkipReason, SkippedPhase};
use glob::Pattern;
use std::collections::BTreeSet;
use tracing::debug;

/// User phase filters. Entries may use `*` and `?` wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseFilter {
    /// When non-empty, only these phases are considered.
    pub only: Vec<String>,
    /// Always removed, whatever `only` says.
    pub skip: Vec<String>,
}

impl PhaseFilter {
    pub fn admits(&self, phase_id: &str) -> bool {
        if self.skip.iter().any(|p| glob_match(p, phase_id)) {
            return false;
        }
        self.only.is_empty() || self.only.iter().any(|p| glob_match(p, phase_id))
    }
}

/// Phases to run, in execution order, plus the ones left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseSelection {
    pub runnable: Vec<Phase>,
    pub skipped: Vec<SkippedPhase>,
}

/// Intersect the catalog with the filters and the available tools.
///
/// Unavailable tools are dropped from a phase; a phase left with no tools is skipped.
/// Runnable phases are sorted by ascending priority, ties broken by id.
pub fn select_phases(
    catalog: &[Phase],
    filter: &PhaseFilter,
    available: &BTreeSet<String>,
) -> PhaseSelection {
    let mut selection = PhaseSelection::default();

    for phase in catalog {
        if !filter.admits(&phase.id) {
            debug!(phase = %phase.id, "phase filtered out");
            selection.skipped.push(SkippedPhase {
                phase: phase.id.clone(),
                reason: SkipReason::Filtered,
            });
            continue;
        }

        let tools: Vec<String> = phase
            .tools
            .iter()
            .filter(|t| available.contains(*t))
            .cloned()
            .collect();

        if tools.is_empty() {
            debug!(phase = %phase.id, "no available tools");
            selection.skipped.push(SkippedPhase {
                phase: phase.id.clone(),
                reason: SkipReason::NoAvailableTools,
            });
            continue;
        }

        let mut runnable = phase.clone();
        runnable.tools = tools;
        selection.runnable.push(runnable);
    }

    selection
        .runnable
        .sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
    selection
}

/// Match a phase id against a filter entry. `*` and `?` are wildcards; an entry that is
/// not a valid pattern only matches itself.
pub fn glob_match(pat: &str, text: &str) -> bool {
    match Pattern::new(pat) {
        Ok(pattern) => pattern.matches(text),
        Err(_) => pat == text,
    }
}

//! The audit pipeline: phase selection, tool execution, dedup, early stop and scoring.

use crate::capabilities::Capabilities;
use crate::error::PipelineError;
use crate::settings::AuditSettings;
use anyhow::Context;
use auditfix_adapter_sdk::AdapterRegistry;
use auditfix_domain::{dedup_by_fingerprint, score, select_phases, summarize};
use auditfix_types::issue::Issue;
use auditfix_types::phase::{Phase, PhaseResult, ToolFailure};
use auditfix_types::run::AuditRun;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use fs_err as fs;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

/// Run the audit pipeline over `catalog`.
///
/// Tool failures are absorbed into `tool_failures`; only a runnable tool without a
/// registered adapter or a worker pool that cannot be built fails the run.
pub fn run_audit(
    settings: &AuditSettings,
    catalog: &[Phase],
    registry: &AdapterRegistry,
    caps: &Capabilities,
) -> Result<AuditRun, PipelineError> {
    let mut run = AuditRun::new(Utc::now());

    let selection = select_phases(catalog, &settings.filter, &caps.tools);
    for skipped in &selection.skipped {
        info!(phase = %skipped.phase, reason = ?skipped.reason, "skipping phase");
    }
    run.skipped = selection.skipped;

    for phase in &selection.runnable {
        if let Some(tool) = phase.tools.iter().find(|t| !registry.contains(t)) {
            return Err(PipelineError::MissingAdapter {
                phase: phase.id.clone(),
                tool: tool.clone(),
            });
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.workers.max(1))
        .thread_name(|i| format!("auditfix-worker-{i}"))
        .build()
        .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;

    let mut seen: BTreeSet<String> = BTreeSet::new();
    for phase in &selection.runnable {
        let span = info_span!("phase", id = %phase.id);
        let _guard = span.enter();
        let started = Instant::now();

        let outcomes: Vec<ToolOutcome> = if phase.parallel {
            pool.install(|| {
                phase
                    .tools
                    .par_iter()
                    .map(|tool| run_tool(registry, tool, &settings.repo_root))
                    .collect()
            })
        } else {
            phase
                .tools
                .iter()
                .map(|tool| run_tool(registry, tool, &settings.repo_root))
                .collect()
        };

        let mut result = PhaseResult {
            phase: phase.id.clone(),
            tools_run: phase.tools.clone(),
            duration_ms: 0,
            issues: vec![],
            tool_failures: vec![],
        };
        let mut issues = Vec::new();
        for outcome in outcomes {
            match outcome {
                ToolOutcome::Issues(found) => issues.extend(found),
                ToolOutcome::Failed(failure) => result.tool_failures.push(failure),
            }
        }
        let phase_issues = dedup_by_fingerprint(issues);

        // Taken before run-wide dedup: a critical already reported by an earlier phase
        // still trips this phase's gate.
        let trigger: Vec<Issue> = if phase.stop_on_critical {
            phase_issues
                .iter()
                .filter(|i| i.severity.is_critical())
                .cloned()
                .collect()
        } else {
            vec![]
        };

        result.issues = phase_issues
            .into_iter()
            .filter(|i| seen.insert(i.fingerprint.clone()))
            .collect();
        result.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            issues = result.issues.len(),
            failures = result.tool_failures.len(),
            duration_ms = result.duration_ms,
            "phase complete"
        );

        run.phases.push(result);

        if !trigger.is_empty() {
            warn!(critical = trigger.len(), "critical findings; stopping early");
            run.stopped_early = true;
            run.stop_trigger = trigger;
            break;
        }
    }

    let all: Vec<Issue> = run.issues().cloned().collect();
    run.summary = summarize(&all);
    run.score = score(&all);
    run.ended_at = Some(Utc::now());
    Ok(run)
}

enum ToolOutcome {
    Issues(Vec<Issue>),
    Failed(ToolFailure),
}

fn run_tool(registry: &AdapterRegistry, tool: &str, root: &Utf8Path) -> ToolOutcome {
    let Some(adapter) = registry.create(tool) else {
        return failed(tool, "no adapter registered".to_string());
    };
    let started = Instant::now();
    match catch_unwind(AssertUnwindSafe(|| adapter.audit(root))) {
        Ok(Ok(issues)) => {
            debug!(tool, issues = issues.len(), elapsed_ms = started.elapsed().as_millis() as u64, "tool finished");
            ToolOutcome::Issues(issues)
        }
        Ok(Err(e)) => failed(tool, e.to_string()),
        Err(panic) => failed(tool, format!("adapter panicked: {}", panic_message(&*panic))),
    }
}

fn failed(tool: &str, reason: String) -> ToolOutcome {
    warn!(tool, %reason, "tool failed; continuing without its findings");
    ToolOutcome::Failed(ToolFailure {
        tool: tool.to_string(),
        reason,
    })
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Default location of the audit run JSON.
pub fn default_audit_path(repo_root: &Utf8Path, state_dir: &str) -> Utf8PathBuf {
    repo_root.join(state_dir).join("audit.json")
}

pub fn write_audit_run(path: &Utf8Path, run: &AuditRun) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create parent dir for {path}"))?;
    }
    let json = serde_json::to_string_pretty(run).context("serialize audit run")?;
    fs::write(path, json).with_context(|| format!("write {path}"))
}

pub fn read_audit_run(path: &Utf8Path) -> anyhow::Result<AuditRun> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parse audit run {path}"))
}

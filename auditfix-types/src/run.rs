use crate::issue::{Issue, Severity};
use crate::phase::{PhaseResult, SkippedPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of one audit pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    pub schema: String,
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Phase results in execution order.
    #[serde(default)]
    pub phases: Vec<PhaseResult>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedPhase>,

    #[serde(default)]
    pub stopped_early: bool,

    /// Critical issues that caused the early stop.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_trigger: Vec<Issue>,

    pub summary: AuditSummary,
    pub score: Score,
}

impl AuditRun {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            schema: crate::schema::AUDITFIX_RUN_V1.to_string(),
            started_at,
            ended_at: None,
            phases: vec![],
            skipped: vec![],
            stopped_early: false,
            stop_trigger: vec![],
            summary: AuditSummary::default(),
            score: Score::default(),
        }
    }

    /// All issues across phases, in phase order.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.phases.iter().flat_map(|p| p.issues.iter())
    }

    pub fn phase(&self, id: &str) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.phase == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    pub fn total(&self) -> u64 {
        self.critical + self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total: u64,
    pub by_severity: SeverityCounts,
    pub auto_fixable: u64,
    pub manual: u64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_tool: BTreeMap<String, u64>,
}

/// Project health, 0–100 globally and per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub global: u8,

    #[serde(default)]
    pub categories: BTreeMap<String, u8>,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            global: 100,
            categories: BTreeMap::new(),
        }
    }
}

use crate::issue::Issue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Risk classification of an auto-fixable issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Risky,
}

impl RiskLevel {
    pub fn is_safe(self) -> bool {
        matches!(self, RiskLevel::Safe)
    }
}

/// Which risk classes a fix session is allowed to touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    #[default]
    Safe,
    Risky,
    All,
}

impl SafetyLevel {
    pub fn includes(self, risk: RiskLevel) -> bool {
        match self {
            SafetyLevel::Safe => risk == RiskLevel::Safe,
            SafetyLevel::Risky => risk == RiskLevel::Risky,
            SafetyLevel::All => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SafetyLevel::Safe => "safe",
            SafetyLevel::Risky => "risky",
            SafetyLevel::All => "all",
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(SafetyLevel::Safe),
            "risky" => Ok(SafetyLevel::Risky),
            "all" => Ok(SafetyLevel::All),
            other => Err(format!("unknown safety level '{other}' (expected safe|risky|all)")),
        }
    }
}

/// Outcome of one adapter fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixResult {
    pub success: bool,
    pub issue: Issue,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_modified: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FixResult {
    pub fn applied(issue: Issue, files_modified: Vec<String>, description: impl Into<String>) -> Self {
        Self {
            success: true,
            issue,
            files_modified,
            description: Some(description.into()),
            reason: None,
        }
    }

    pub fn failed(issue: Issue, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            issue,
            files_modified: vec![],
            description: None,
            reason: Some(reason.into()),
        }
    }

    /// Reason text for failures, `"unknown"` when an adapter left it empty.
    pub fn reason_or_unknown(&self) -> &str {
        self.reason.as_deref().unwrap_or("unknown")
    }
}

/// What a fix would do, computed without touching the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixPreview {
    pub issue: Issue,
    pub risk_level: RiskLevel,
    pub estimated_change: String,
    pub files_affected: Vec<String>,
    pub reversible: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// One line of the append-only fixes log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixLogRecord {
    pub timestamp: DateTime<Utc>,
    pub issue: Issue,
    pub result: FixResult,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
}

/// A fix that did not make it into the tree, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixError {
    pub issue: Issue,
    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixSummary {
    pub total_attempted: u64,
    pub successful: u64,
    pub failed: u64,
    pub declined: u64,
    pub rolled_back: u64,
}

/// Cumulative report of one fix session (`fixes-report.json`, replaced per run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixReport {
    pub schema: String,
    pub generated_at: DateTime<Utc>,
    pub level: SafetyLevel,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub fixes: Vec<FixResult>,

    #[serde(default)]
    pub errors: Vec<FixError>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previews: Vec<FixPreview>,

    #[serde(default)]
    pub files_modified: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,

    /// Fingerprints of fixes that were applied and then rolled back with their batch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rolled_back: Vec<String>,

    /// Snapshots whose restoration could not be verified; manual recovery required.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollback_failures: Vec<String>,

    pub summary: FixSummary,
}

impl FixReport {
    pub fn new(level: SafetyLevel, dry_run: bool) -> Self {
        Self {
            schema: crate::schema::AUDITFIX_FIXES_V1.to_string(),
            generated_at: Utc::now(),
            level,
            dry_run,
            fixes: vec![],
            errors: vec![],
            previews: vec![],
            files_modified: vec![],
            snapshots: vec![],
            branches: vec![],
            rolled_back: vec![],
            rollback_failures: vec![],
            summary: FixSummary::default(),
        }
    }

    pub fn record_applied(&mut self, result: FixResult) {
        self.summary.successful += 1;
        self.fixes.push(result);
    }

    pub fn record_error(&mut self, issue: Issue, reason: impl Into<String>, snapshot_id: Option<&str>) {
        self.summary.failed += 1;
        self.errors.push(FixError {
            issue,
            reason: reason.into(),
            snapshot_id: snapshot_id.map(str::to_string),
        });
    }

    /// Files a committed batch changed that no fixer reported.
    pub fn record_unreported_files(&mut self, files: impl IntoIterator<Item = String>) {
        self.files_modified.extend(files);
    }

    /// Merge the applied fixes' files into `files_modified` (sorted, unique).
    pub fn finalize(&mut self) {
        let files: BTreeSet<String> = self
            .fixes
            .iter()
            .flat_map(|f| f.files_modified.iter().cloned())
            .chain(self.files_modified.drain(..))
            .collect();
        self.files_modified = files.into_iter().collect();
        self.generated_at = Utc::now();
    }

    pub fn has_rollback_failures(&self) -> bool {
        !self.rollback_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;

    fn issue() -> Issue {
        Issue::new("rustfmt", "formatting", Severity::Low, "bad indent", "src/lib.rs")
    }

    #[test]
    fn safety_level_includes() {
        assert!(SafetyLevel::Safe.includes(RiskLevel::Safe));
        assert!(!SafetyLevel::Safe.includes(RiskLevel::Risky));
        assert!(SafetyLevel::Risky.includes(RiskLevel::Risky));
        assert!(!SafetyLevel::Risky.includes(RiskLevel::Safe));
        assert!(SafetyLevel::All.includes(RiskLevel::Safe));
        assert!(SafetyLevel::All.includes(RiskLevel::Risky));
    }

    #[test]
    fn safety_level_parses() {
        assert_eq!("ALL".parse::<SafetyLevel>(), Ok(SafetyLevel::All));
        assert!("reckless".parse::<SafetyLevel>().is_err());
    }

    #[test]
    fn finalize_merges_and_dedups_modified_files() {
        let mut report = FixReport::new(SafetyLevel::Safe, false);
        report.record_applied(FixResult::applied(
            issue(),
            vec!["src/b.rs".to_string(), "src/a.rs".to_string()],
            "formatted",
        ));
        report.record_applied(FixResult::applied(issue(), vec!["src/a.rs".to_string()], "formatted"));
        report.record_unreported_files(["src/c.rs".to_string(), "src/b.rs".to_string()]);
        report.finalize();
        assert_eq!(report.files_modified, vec!["src/a.rs", "src/b.rs", "src/c.rs"]);
        assert_eq!(report.summary.successful, 2);
    }

    #[test]
    fn failed_result_serializes_reason_only() {
        let value = serde_json::to_value(FixResult::failed(issue(), "boom")).expect("serialize");
        assert_eq!(value["success"], false);
        assert_eq!(value["reason"], "boom");
        assert!(value.get("files_modified").is_none());
        assert!(value.get("description").is_none());
    }
}

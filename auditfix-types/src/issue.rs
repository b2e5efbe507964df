use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a finding, most severe first.
///
/// The derived ordering sorts `Critical` before `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    pub fn is_critical(self) -> bool {
        matches!(self, Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding reported by one analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub tool: String,

    /// Tool-specific rule or check identifier.
    #[serde(rename = "type")]
    pub kind: String,

    pub severity: Severity,
    pub category: String,
    pub message: String,
    pub file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    pub fingerprint: String,

    #[serde(default)]
    pub auto_fixable: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Default category for findings whose tool does not report one.
pub const DEFAULT_CATEGORY: &str = "general";

impl Issue {
    pub fn new(
        tool: impl Into<String>,
        kind: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        let mut issue = Self {
            tool: tool.into(),
            kind: kind.into(),
            severity,
            category: DEFAULT_CATEGORY.to_string(),
            message: message.into(),
            file: file.into(),
            line: None,
            column: None,
            fingerprint: String::new(),
            auto_fixable: false,
            metadata: BTreeMap::new(),
        };
        issue.refresh_fingerprint();
        issue
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn at(mut self, line: u32, column: Option<u32>) -> Self {
        self.line = Some(line);
        self.column = column;
        self.refresh_fingerprint();
        self
    }

    pub fn fixable(mut self, auto_fixable: bool) -> Self {
        self.auto_fixable = auto_fixable;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Recompute the fingerprint from `(tool, file, line, message)`.
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint =
            auditfix_hash::fingerprint(&self.tool, &self.file, self.line, &self.message);
    }

    /// Rule used for risk classification: `metadata.rule` when it is a string, else `type`.
    pub fn rule(&self) -> &str {
        self.metadata
            .get("rule")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.kind)
    }

    /// `file:line`, or just the file when no line is known.
    pub fn location(&self) -> String {
        match self.line {
            Some(line) => format!("{}:{}", self.file, line),
            None => self.file.clone(),
        }
    }
}

use auditfix_types::fix::RiskLevel;
use auditfix_types::issue::Issue;
use std::collections::BTreeSet;

/// Tools whose fixes are considered mechanical.
pub const BUILTIN_SAFE_TOOLS: &[&str] = &["rustfmt", "clippy", "taplo"];

/// Rules whose fixes only change layout or remove redundancy.
pub const BUILTIN_SAFE_RULES: &[&str] = &[
    "formatting",
    "whitespace",
    "trailing_whitespace",
    "import_ordering",
    "clippy::needless_return",
    "clippy::redundant_field_names",
    "clippy::redundant_static_lifetimes",
    "clippy::unused_unit",
    "clippy::single_char_pattern",
    "clippy::needless_borrow",
    "toml_formatting",
];

/// Classifies fixes as safe or risky.
///
/// A fix is safe only when both its tool and its rule are allow-listed. Unknown tools
/// are always risky.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categorizer {
    safe_tools: BTreeSet<String>,
    safe_rules: BTreeSet<String>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Categorizer {
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_SAFE_TOOLS.iter().copied(),
            BUILTIN_SAFE_RULES.iter().copied(),
        )
    }

    pub fn new<T, R>(tools: impl IntoIterator<Item = T>, rules: impl IntoIterator<Item = R>) -> Self
    where
        T: Into<String>,
        R: Into<String>,
    {
        Self {
            safe_tools: tools.into_iter().map(Into::into).collect(),
            safe_rules: rules.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classify(&self, tool: &str, rule: &str) -> RiskLevel {
        if self.safe_tools.contains(tool) && self.safe_rules.contains(rule) {
            RiskLevel::Safe
        } else {
            RiskLevel::Risky
        }
    }

    pub fn classify_issue(&self, issue: &Issue) -> RiskLevel {
        self.classify(&issue.tool, issue.rule())
    }

    /// Shown to the user before a risky fix is confirmed.
    pub fn risk_statement(&self, issue: &Issue) -> String {
        match self.classify_issue(issue) {
            RiskLevel::Safe => format!(
                "{} fix for rule '{}' only changes formatting or removes redundancy",
                issue.tool,
                issue.rule()
            ),
            RiskLevel::Risky if !self.safe_tools.contains(&issue.tool) => format!(
                "{} is not a known mechanical fixer; the change may alter behavior",
                issue.tool
            ),
            RiskLevel::Risky => format!(
                "rule '{}' is not on the safe list; the change may alter behavior",
                issue.rule()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditfix_types::issue::Severity;

    #[test]
    fn safe_needs_tool_and_rule() {
        let c = Categorizer::builtin();
        assert_eq!(c.classify("rustfmt", "formatting"), RiskLevel::Safe);
        assert_eq!(c.classify("clippy", "clippy::needless_return"), RiskLevel::Safe);
        assert_eq!(c.classify("clippy", "clippy::unwrap_used"), RiskLevel::Risky);
        assert_eq!(c.classify("cargo-machete", "formatting"), RiskLevel::Risky);
    }

    #[test]
    fn uses_metadata_rule() {
        let c = Categorizer::builtin();
        let issue = Issue::new("clippy", "style", Severity::Low, "m", "a.rs")
            .with_metadata("rule", serde_json::json!("clippy::unused_unit"));
        assert_eq!(c.classify_issue(&issue), RiskLevel::Safe);
    }

    #[test]
    fn risk_statement_names_the_reason() {
        let c = Categorizer::builtin();
        let unknown = Issue::new("cargo-machete", "unused_dep", Severity::Medium, "m", "Cargo.toml");
        assert!(c.risk_statement(&unknown).contains("cargo-machete"));

        let rule = Issue::new("clippy", "clippy::unwrap_used", Severity::Medium, "m", "a.rs");
        assert!(c.risk_statement(&rule).contains("clippy::unwrap_used"));
    }
}

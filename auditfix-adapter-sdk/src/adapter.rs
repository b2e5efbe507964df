use crate::AdapterError;
use auditfix_types::fix::FixResult;
use auditfix_types::issue::Issue;
use camino::Utf8Path;

/// One external analyzer.
pub trait Adapter: Send + Sync {
    /// Tool id, as used in phase definitions.
    fn tool(&self) -> &str;

    /// Whether the tool can run here. Called once when capabilities are probed.
    fn is_available(&self) -> bool {
        true
    }

    /// Read-only analysis of the tree at `root`.
    fn audit(&self, root: &Utf8Path) -> Result<Vec<Issue>, AdapterError>;

    /// Apply fixes for `issues`, returning one result per issue.
    fn auto_fix(&self, root: &Utf8Path, issues: &[Issue]) -> Result<Vec<FixResult>, AdapterError>;

    /// Optional textual preview of the change for `issue`.
    fn preview(&self, _issue: &Issue) -> Option<String> {
        None
    }

    fn describe_fix(&self, issue: &Issue) -> String {
        format!("{} fix for {} at {}", self.tool(), issue.rule(), issue.location())
    }
}

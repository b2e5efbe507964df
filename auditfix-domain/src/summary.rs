use auditfix_types::issue::Issue;
use auditfix_types::run::AuditSummary;
use std::collections::BTreeSet;

/// Counts by severity, by fixability and by tool.
pub fn summarize(issues: &[Issue]) -> AuditSummary {
    let mut summary = AuditSummary::default();
    for issue in issues {
        summary.total += 1;
        summary.by_severity.add(issue.severity);
        if issue.auto_fixable {
            summary.auto_fixable += 1;
        } else {
            summary.manual += 1;
        }
        *summary.by_tool.entry(issue.tool.clone()).or_insert(0) += 1;
    }
    summary
}

/// Drop later issues whose fingerprint was already seen. Order is preserved.
pub fn dedup_by_fingerprint(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen = BTreeSet::new();
    issues
        .into_iter()
        .filter(|i| seen.insert(i.fingerprint.clone()))
        .collect()
}

use crate::AdapterError;
use auditfix_types::issue::{DEFAULT_CATEGORY, Issue, Severity};
use serde::Deserialize;

/// Findings document as emitted by a sensor.
///
/// Parsing is tolerant: unknown fields are ignored and every field is optional. A bare
/// array of findings is accepted as well as the full envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    Bare(Vec<RawFinding>),
    Envelope(Envelope),
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    findings: Vec<RawFinding>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFinding {
    #[serde(default)]
    severity: Option<String>,

    #[serde(default)]
    check_id: Option<String>,

    #[serde(default)]
    code: Option<String>,

    #[serde(default)]
    category: Option<String>,

    #[serde(default)]
    message: Option<String>,

    #[serde(default)]
    location: Option<RawLocation>,

    #[serde(default)]
    fixable: bool,

    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLocation {
    #[serde(default)]
    path: String,

    #[serde(default)]
    line: Option<u32>,

    #[serde(default)]
    column: Option<u32>,
}

/// Map a tool's severity word onto the four-level scale. Unknown words are `Low`.
pub fn map_severity(word: &str) -> Severity {
    match word.trim().to_ascii_lowercase().as_str() {
        "critical" | "fatal" => Severity::Critical,
        "high" | "error" => Severity::High,
        "medium" | "warn" | "warning" => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Parse `stdout` of `tool` into issues.
///
/// Empty output means no findings.
pub fn parse_findings(tool: &str, stdout: &str) -> Result<Vec<Issue>, AdapterError> {
    if stdout.trim().is_empty() {
        return Ok(vec![]);
    }

    let doc: Document = serde_json::from_str(stdout).map_err(|e| AdapterError::Parse {
        tool: tool.to_string(),
        message: e.to_string(),
    })?;

    let findings = match doc {
        Document::Bare(findings) => findings,
        Document::Envelope(envelope) => envelope.findings,
    };

    Ok(findings.into_iter().map(|f| into_issue(tool, f)).collect())
}

fn into_issue(tool: &str, finding: RawFinding) -> Issue {
    let kind = finding
        .check_id
        .clone()
        .or_else(|| finding.code.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let severity = finding
        .severity
        .as_deref()
        .map(map_severity)
        .unwrap_or(Severity::Low);
    let message = finding.message.unwrap_or_else(|| kind.clone());
    let location = finding.location.unwrap_or_default();

    let mut issue = Issue::new(tool, kind, severity, message, location.path)
        .with_category(
            finding
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        )
        .fixable(finding.fixable);

    if let Some(line) = location.line {
        issue = issue.at(line, location.column);
    }
    // check_id names the rule; a separate code is kept for reference.
    if let (Some(_), Some(code)) = (&finding.check_id, finding.code) {
        issue = issue.with_metadata("code", serde_json::Value::String(code));
    }
    if let Some(data) = finding.data {
        issue = issue.with_metadata("data", data);
    }
    issue
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn severity_words() {
        assert_eq!(map_severity("fatal"), Severity::Critical);
        assert_eq!(map_severity("ERROR"), Severity::High);
        assert_eq!(map_severity("warning"), Severity::Medium);
        assert_eq!(map_severity("help"), Severity::Low);
        assert_eq!(map_severity("whatever"), Severity::Low);
    }

    #[test]
    fn parses_envelope() {
        let stdout = r#"{
            "schema": "sensor.report.v1",
            "tool": {"name": "clippy"},
            "findings": [{
                "severity": "warn",
                "check_id": "clippy::needless_return",
                "code": "needless_return",
                "category": "style",
                "message": "unneeded return statement",
                "location": {"path": "src/lib.rs", "line": 3, "column": 5},
                "fixable": true,
                "extra": "ignored"
            }]
        }"#;
        let issues = parse_findings("clippy", stdout).expect("parse");
        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.kind, "clippy::needless_return");
        assert_eq!(issue.severity, Severity::Medium);
        assert_eq!(issue.category, "style");
        assert_eq!(issue.file, "src/lib.rs");
        assert_eq!(issue.line, Some(3));
        assert_eq!(issue.column, Some(5));
        assert!(issue.auto_fixable);
        assert_eq!(issue.metadata["code"], "needless_return");
        assert_eq!(
            issue.fingerprint,
            auditfix_hash::fingerprint("clippy", "src/lib.rs", Some(3), "unneeded return statement")
        );
    }

    #[test]
    fn parses_bare_array_with_defaults() {
        let issues = parse_findings("cargo-audit", r#"[{"code": "RUSTSEC-2024-0001"}]"#)
            .expect("parse");
        assert_eq!(issues[0].kind, "RUSTSEC-2024-0001");
        assert_eq!(issues[0].message, "RUSTSEC-2024-0001");
        assert_eq!(issues[0].severity, Severity::Low);
        assert_eq!(issues[0].category, DEFAULT_CATEGORY);
        assert!(!issues[0].auto_fixable);
    }

    #[test]
    fn empty_output_is_no_findings() {
        assert!(parse_findings("x", "  \n").expect("parse").is_empty());
        assert!(parse_findings("x", "{}").expect("parse").is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_findings("x", "not json").expect_err("should fail");
        assert!(matches!(err, AdapterError::Parse { .. }));
    }
}

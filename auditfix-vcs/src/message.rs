use auditfix_types::fix::FixResult;
use auditfix_types::issue::Issue;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const COMMIT_TRAILER_FIXES: &str = "Auditfix-Fixes";
pub const COMMIT_TRAILER_FINGERPRINTS: &str = "Auditfix-Fingerprints";

/// Structured commit message for a set of applied fixes.
///
/// ```text
/// <summary>
///
/// Tools:
/// - clippy: 2
///
/// Fixes:
/// - clippy fix for clippy::needless_return at src/lib.rs:3
///
/// Auditfix-Fixes: 2
/// Auditfix-Fingerprints: 0123456789abcdef, fedcba9876543210
/// ```
pub fn build_commit_message(summary: &str, results: &[FixResult]) -> String {
    let applied: Vec<&FixResult> = results.iter().filter(|r| r.success).collect();

    let mut per_tool: BTreeMap<&str, usize> = BTreeMap::new();
    for r in &applied {
        *per_tool.entry(r.issue.tool.as_str()).or_default() += 1;
    }

    let mut msg = String::new();
    let summary = summary.trim();
    if summary.is_empty() {
        let _ = writeln!(msg, "auditfix: apply {} fix(es)", applied.len());
    } else {
        let _ = writeln!(msg, "{summary}");
    }

    msg.push_str("\nTools:\n");
    for (tool, count) in &per_tool {
        let _ = writeln!(msg, "- {tool}: {count}");
    }

    msg.push_str("\nFixes:\n");
    for r in &applied {
        let description = r
            .description
            .clone()
            .unwrap_or_else(|| format!("{} at {}", r.issue.rule(), r.issue.location()));
        let _ = writeln!(msg, "- {description}");
    }

    let fingerprints: Vec<&str> = applied.iter().map(|r| r.issue.fingerprint.as_str()).collect();
    let _ = writeln!(msg, "\n{COMMIT_TRAILER_FIXES}: {}", applied.len());
    let _ = write!(msg, "{COMMIT_TRAILER_FINGERPRINTS}: {}", fingerprints.join(", "));
    msg
}

/// Branch name for a fix attempt.
///
/// A single issue gets `<prefix>/<fingerprint>`; a batch gets `<prefix>/batch-<digest>`
/// where the digest covers every fingerprint in the batch.
pub fn fix_branch_name(prefix: &str, issues: &[Issue]) -> String {
    let prefix = prefix.trim_end_matches('/');
    match issues {
        [single] => format!("{prefix}/{}", single.fingerprint),
        many => {
            let mut fingerprints: Vec<&str> = many.iter().map(|i| i.fingerprint.as_str()).collect();
            fingerprints.sort_unstable();
            let digest = auditfix_hash::sha256_hex(fingerprints.join(",").as_bytes());
            format!("{prefix}/batch-{}", &digest[..12])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditfix_types::issue::Severity;

    fn applied(tool: &str, file: &str) -> FixResult {
        let issue = Issue::new(tool, "formatting", Severity::Low, "m", file).at(3, None);
        FixResult::applied(issue, vec![file.to_string()], format!("{tool} formatted {file}"))
    }

    #[test]
    fn message_has_counts_and_trailers() {
        let results = vec![
            applied("rustfmt", "src/a.rs"),
            applied("rustfmt", "src/b.rs"),
            applied("clippy", "src/c.rs"),
            FixResult::failed(Issue::new("clippy", "x", Severity::Low, "m", "src/d.rs"), "no"),
        ];
        let msg = build_commit_message("auditfix: safe fixes", &results);
        let lines: Vec<&str> = msg.lines().collect();

        assert_eq!(lines[0], "auditfix: safe fixes");
        assert!(msg.contains("- clippy: 1\n- rustfmt: 2\n"));
        assert!(msg.contains("- rustfmt formatted src/a.rs"));
        assert!(!msg.contains("src/d.rs"));
        assert_eq!(lines[lines.len() - 2], "Auditfix-Fixes: 3");
        assert!(lines[lines.len() - 1].starts_with("Auditfix-Fingerprints: "));
        assert!(lines[lines.len() - 1].contains(&results[0].issue.fingerprint));
    }

    #[test]
    fn empty_summary_gets_default() {
        let msg = build_commit_message("  ", &[applied("rustfmt", "src/a.rs")]);
        assert!(msg.starts_with("auditfix: apply 1 fix(es)\n"));
    }

    #[test]
    fn branch_names() {
        let a = Issue::new("clippy", "r", Severity::Low, "m", "a.rs");
        let b = Issue::new("clippy", "r", Severity::Low, "m", "b.rs");

        assert_eq!(fix_branch_name("auditfix/", &[a.clone()]), format!("auditfix/{}", a.fingerprint));

        let ab = fix_branch_name("auditfix", &[a.clone(), b.clone()]);
        let ba = fix_branch_name("auditfix", &[b, a]);
        assert_eq!(ab, ba);
        assert!(ab.starts_with("auditfix/batch-"));
        assert_eq!(ab.len(), "auditfix/batch-".len() + 12);
    }
}

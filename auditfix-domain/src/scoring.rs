use auditfix_types::issue::{Issue, Severity};
use auditfix_types::run::Score;
use std::collections::BTreeMap;

/// Points subtracted per issue, by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenaltyTable {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl PenaltyTable {
    pub fn penalty(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// 100 minus the summed penalties, floored at 0.
    pub fn apply<'a>(&self, issues: impl IntoIterator<Item = &'a Issue>) -> u8 {
        let total: u64 = issues
            .into_iter()
            .map(|i| u64::from(self.penalty(i.severity)))
            .sum();
        100u64.saturating_sub(total) as u8
    }
}

pub const GLOBAL_PENALTIES: PenaltyTable = PenaltyTable {
    critical: 20,
    high: 10,
    medium: 5,
    low: 1,
};

pub const CATEGORY_PENALTIES: PenaltyTable = PenaltyTable {
    critical: 25,
    high: 15,
    medium: 8,
    low: 3,
};

/// Score with the default penalty tables.
pub fn score(issues: &[Issue]) -> Score {
    score_with(issues, &GLOBAL_PENALTIES, &CATEGORY_PENALTIES)
}

/// Global score plus one score per category that has at least one issue.
pub fn score_with(issues: &[Issue], global: &PenaltyTable, per_category: &PenaltyTable) -> Score {
    let mut by_category: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        by_category.entry(issue.category.as_str()).or_default().push(issue);
    }

    Score {
        global: global.apply(issues),
        categories: by_category
            .into_iter()
            .map(|(cat, scoped)| (cat.to_string(), per_category.apply(scoped)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(severity: Severity, category: &str) -> Issue {
        Issue::new("t", "r", severity, "m", "f.rs").with_category(category)
    }

    #[test]
    fn empty_run_scores_100() {
        let s = score(&[]);
        assert_eq!(s.global, 100);
        assert!(s.categories.is_empty());
    }

    #[test]
    fn one_critical() {
        let s = score(&[issue(Severity::Critical, "security")]);
        assert_eq!(s.global, 80);
        assert_eq!(s.categories["security"], 75);
    }

    #[test]
    fn mixed_categories() {
        let issues = vec![
            issue(Severity::High, "style"),
            issue(Severity::Medium, "style"),
            issue(Severity::Low, "deps"),
        ];
        let s = score(&issues);
        assert_eq!(s.global, 100 - 10 - 5 - 1);
        assert_eq!(s.categories["style"], 100 - 15 - 8);
        assert_eq!(s.categories["deps"], 97);
    }

    #[test]
    fn floors_at_zero() {
        let issues: Vec<_> = (0..6).map(|_| issue(Severity::Critical, "security")).collect();
        let s = score(&issues);
        assert_eq!(s.global, 0);
        assert_eq!(s.categories["security"], 0);
    }
}

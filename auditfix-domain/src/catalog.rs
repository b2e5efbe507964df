use auditfix_types::phase::Phase;

/// The static phase catalog for a Cargo project.
///
/// Security runs first and stops the pipeline on a critical finding; later phases only
/// read the tree and never gate each other.
pub fn builtin_phases() -> Vec<Phase> {
    vec![
        Phase::new("security", "Security advisories", 10)
            .with_tools(["cargo-audit", "cargo-deny"])
            .parallel()
            .stop_on_critical(),
        Phase::new("lint", "Lints and formatting", 20)
            .with_tools(["clippy", "rustfmt", "taplo"])
            .parallel(),
        Phase::new("dependencies", "Dependency hygiene", 30)
            .with_tools(["cargo-machete", "cargo-udeps", "cargo-outdated"])
            .parallel(),
        Phase::new("unsafe-code", "Unsafe code usage", 40).with_tools(["cargo-geiger"]),
        Phase::new("tests", "Test suite health", 50).with_tools(["cargo-nextest"]),
    ]
}

/// Ids of the built-in phases, in priority order.
pub fn phase_ids() -> Vec<String> {
    let mut phases = builtin_phases();
    phases.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
    phases.into_iter().map(|p| p.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn ids_and_priorities_are_unique() {
        let phases = builtin_phases();
        let ids: BTreeSet<_> = phases.iter().map(|p| p.id.as_str()).collect();
        let priorities: BTreeSet<_> = phases.iter().map(|p| p.priority).collect();
        assert_eq!(ids.len(), phases.len());
        assert_eq!(priorities.len(), phases.len());
    }

    #[test]
    fn security_is_first_and_gates() {
        let ids = phase_ids();
        assert_eq!(ids[0], "security");
        let security = builtin_phases().into_iter().find(|p| p.id == "security").unwrap();
        assert!(security.stop_on_critical);
        assert!(security.parallel);
    }

    #[test]
    fn every_phase_has_tools() {
        assert!(builtin_phases().iter().all(|p| !p.tools.is_empty()));
    }
}

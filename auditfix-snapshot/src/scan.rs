use crate::{SnapshotError, SnapshotResult};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;

/// Files whose loss would break a Cargo project.
pub const DEFAULT_CRITICAL_PATTERNS: &[&str] = &[
    "Cargo.toml",
    "Cargo.lock",
    "**/Cargo.toml",
    "**/src/**/*",
    "**/tests/**/*",
    "**/benches/**/*",
    "**/build.rs",
    "config/**/*",
    ".cargo/config.toml",
    ".cargo/config",
    "migrations/**/*",
    "**/*.sql",
    "rust-toolchain.toml",
    "rust-toolchain",
    "rustfmt.toml",
    ".rustfmt.toml",
    "clippy.toml",
    "deny.toml",
];

/// Directories, relative to the root, never descended into.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["target", ".git"];

const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled set of critical-file patterns.
#[derive(Debug, Clone)]
pub struct CriticalFiles {
    patterns: Vec<Pattern>,
    excluded_dirs: BTreeSet<String>,
}

impl CriticalFiles {
    /// Default patterns plus `extra`, skipping `state_dir` and the default excluded dirs.
    pub fn new(extra: &[String], state_dir: &str) -> SnapshotResult<Self> {
        let patterns = DEFAULT_CRITICAL_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(extra.iter().cloned())
            .map(|p| {
                Pattern::new(&p).map_err(|e| SnapshotError::Pattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<SnapshotResult<Vec<_>>>()?;

        let mut excluded_dirs: BTreeSet<String> =
            DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect();
        excluded_dirs.insert(normalize_dir(state_dir));

        Ok(Self {
            patterns,
            excluded_dirs,
        })
    }

    pub fn matches(&self, rel: &str) -> bool {
        self.patterns.iter().any(|p| p.matches_with(rel, MATCH))
    }

    /// Relative paths (forward slashes) of every matching file under `root`, sorted.
    pub fn collect(&self, root: &Utf8Path) -> SnapshotResult<BTreeSet<String>> {
        let mut out = BTreeSet::new();
        let mut stack: Vec<Utf8PathBuf> = vec![Utf8PathBuf::new()];

        while let Some(rel_dir) = stack.pop() {
            for entry in fs::read_dir(root.join(&rel_dir))? {
                let entry = entry?;
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                let rel = rel_dir.join(&name);
                let file_type = entry.file_type()?;

                let rel_str = rel.as_str().replace('\\', "/");

                if file_type.is_dir() {
                    if !self.excluded_dirs.contains(&rel_str) {
                        stack.push(rel);
                    }
                } else if file_type.is_file() && self.matches(&rel_str) {
                    out.insert(rel_str);
                }
            }
        }
        Ok(out)
    }
}

fn normalize_dir(dir: &str) -> String {
    dir.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

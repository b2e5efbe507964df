//! Configuration file loading for auditfix.
//!
//! Discovers and loads `auditfix.toml` from the repository root.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use auditfix_adapter_sdk::ToolSpec;
use auditfix_core::settings::{DEFAULT_BRANCH_PREFIX, DEFAULT_SNAPSHOT_RETENTION, DEFAULT_WORKERS};
use auditfix_domain::PhaseFilter;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "auditfix.toml";

/// Top-level configuration from auditfix.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuditfixConfig {
    pub audit: AuditConfig,

    /// Per-tool command overrides, keyed by tool id.
    pub tools: BTreeMap<String, ToolSpec>,

    pub fix: FixConfig,
    pub snapshot: SnapshotConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Phase ids (wildcards allowed). Empty means every phase.
    pub only: Vec<String>,
    pub skip: Vec<String>,
    pub workers: usize,

    /// Absent means tools may run forever.
    pub tool_timeout_secs: Option<u64>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            only: vec![],
            skip: vec![],
            workers: DEFAULT_WORKERS,
            tool_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    pub auto_apply_safe: bool,
    pub allow_dirty: bool,
    pub branch_prefix: String,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            auto_apply_safe: false,
            allow_dirty: false,
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Extra critical-file globs on top of the built-in list.
    pub paths: Vec<String>,
    pub retention: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            paths: vec![],
            retention: DEFAULT_SNAPSHOT_RETENTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,

    /// Smoke command; empty disables the stage.
    pub smoke: Vec<String>,

    /// Test command; runs only when the project has a `tests/` directory.
    pub tests: Vec<String>,
    pub test_filter: Option<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smoke: vec!["cargo".into(), "check".into(), "--quiet".into()],
            tests: vec!["cargo".into(), "test".into(), "--quiet".into()],
            test_filter: Some("smoke".to_string()),
        }
    }
}

/// Discover the auditfix.toml config file.
///
/// Returns `None` if no config file is found in the repository root.
pub fn discover_config(repo_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = repo_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

pub fn load_config(path: &Utf8Path) -> anyhow::Result<AuditfixConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<AuditfixConfig> {
    let config: AuditfixConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from repo root, or return default if not found.
pub fn load_or_default(repo_root: &Utf8Path) -> anyhow::Result<AuditfixConfig> {
    match discover_config(repo_root) {
        Some(path) => load_config(&path),
        None => Ok(AuditfixConfig::default()),
    }
}

/// Configuration after CLI arguments have been applied on top of the file.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub filter: PhaseFilter,
    pub workers: usize,
    pub tool_timeout: Option<Duration>,
    pub tools: BTreeMap<String, ToolSpec>,
    pub auto_apply_safe: bool,
    pub allow_dirty: bool,
    pub branch_prefix: String,
    pub snapshot_paths: Vec<String>,
    pub snapshot_retention: usize,
    pub validation: ValidationConfig,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: AuditfixConfig,
}

impl ConfigMerger {
    pub fn new(config: AuditfixConfig) -> Self {
        Self { config }
    }

    /// CLI `only` and `skip` lists extend the config file lists.
    pub fn merge_audit_args(self, cli_only: &[String], cli_skip: &[String]) -> MergedConfig {
        let mut only = self.config.audit.only.clone();
        let mut skip = self.config.audit.skip.clone();
        extend_unique(&mut only, cli_only);
        extend_unique(&mut skip, cli_skip);
        self.into_merged(PhaseFilter { only, skip }, false, false)
    }

    /// CLI boolean flags are OR-ed with the config file values.
    pub fn merge_fix_args(self, cli_auto_apply_safe: bool, cli_allow_dirty: bool) -> MergedConfig {
        let filter = PhaseFilter {
            only: self.config.audit.only.clone(),
            skip: self.config.audit.skip.clone(),
        };
        self.into_merged(filter, cli_auto_apply_safe, cli_allow_dirty)
    }

    fn into_merged(self, filter: PhaseFilter, auto_apply_safe: bool, allow_dirty: bool) -> MergedConfig {
        let config = self.config;
        MergedConfig {
            filter,
            workers: config.audit.workers.max(1),
            tool_timeout: config.audit.tool_timeout_secs.map(Duration::from_secs),
            tools: config.tools,
            auto_apply_safe: auto_apply_safe || config.fix.auto_apply_safe,
            allow_dirty: allow_dirty || config.fix.allow_dirty,
            branch_prefix: config.fix.branch_prefix,
            snapshot_paths: config.snapshot.paths,
            snapshot_retention: config.snapshot.retention,
            validation: config.validation,
        }
    }
}

fn extend_unique(into: &mut Vec<String>, extra: &[String]) {
    for pattern in extra {
        if !into.contains(pattern) {
            into.push(pattern.clone());
        }
    }
}

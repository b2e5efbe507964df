//! Library half of the `auditfix` binary: config loading and wiring of the core ports.

pub mod config;

use anyhow::Context;
use auditfix_adapter_sdk::{AdapterRegistry, ToolSpec};
use auditfix_core::adapters::{CommandValidator, NoValidation};
use auditfix_core::settings::DEFAULT_STATE_DIR;
use auditfix_core::{AuditSettings, Capabilities, ProjectValidator};
use auditfix_process::{ProcessRunner, SystemProcessRunner};
use auditfix_snapshot::SnapshotManager;
use auditfix_types::phase::Phase;
use auditfix_vcs::GitManager;
use camino::Utf8PathBuf;
use config::MergedConfig;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Command specs for every cataloged tool: configured ones first, `auditfix-<tool>`
/// sensors for the rest. Configured tools outside the catalog are kept.
pub fn tool_specs(catalog: &[Phase], configured: &BTreeMap<String, ToolSpec>) -> BTreeMap<String, ToolSpec> {
    let mut specs = configured.clone();
    for tool in catalog.iter().flat_map(|p| p.tools.iter()) {
        specs
            .entry(tool.clone())
            .or_insert_with(|| ToolSpec::sensor(tool));
    }
    specs
}

/// Everything a command needs to talk to one repository.
pub struct Workspace {
    pub root: Utf8PathBuf,
    pub config: MergedConfig,
    pub runner: Arc<dyn ProcessRunner>,
    pub git: GitManager,
}

impl Workspace {
    pub fn new(root: Utf8PathBuf, config: MergedConfig) -> Self {
        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner::new());
        let git = GitManager::new(root.clone(), Arc::clone(&runner)).exclude(DEFAULT_STATE_DIR);
        Self {
            root,
            config,
            runner,
            git,
        }
    }

    pub fn registry(&self, catalog: &[Phase]) -> AdapterRegistry {
        AdapterRegistry::from_specs(
            &tool_specs(catalog, &self.config.tools),
            Arc::clone(&self.runner),
            self.config.tool_timeout,
        )
    }

    pub fn capabilities(&self, registry: &AdapterRegistry) -> Capabilities {
        Capabilities::probe(registry, registry.tools(), &self.git)
    }

    pub fn audit_settings(&self) -> AuditSettings {
        AuditSettings {
            repo_root: self.root.clone(),
            filter: self.config.filter.clone(),
            workers: self.config.workers,
        }
    }

    pub fn snapshots(&self) -> anyhow::Result<SnapshotManager> {
        let manager = SnapshotManager::new(self.root.clone(), DEFAULT_STATE_DIR, &self.config.snapshot_paths)
            .context("configure snapshots")?;
        Ok(manager.with_git(self.git.clone()))
    }

    pub fn validator(&self) -> Box<dyn ProjectValidator> {
        let validation = &self.config.validation;
        if !validation.enabled {
            return Box::new(NoValidation);
        }
        Box::new(
            CommandValidator::new(
                Arc::clone(&self.runner),
                validation.smoke.clone(),
                validation.tests.clone(),
                validation.test_filter.clone(),
            )
            .with_timeout(self.config.tool_timeout),
        )
    }
}

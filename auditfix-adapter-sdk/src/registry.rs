use crate::{Adapter, CommandAdapter, ToolSpec};
use auditfix_process::ProcessRunner;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Builds a fresh adapter instance.
pub type AdapterFactory = Box<dyn Fn() -> Arc<dyn Adapter> + Send + Sync>;

/// Tool id -> adapter factory.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: BTreeMap<String, AdapterFactory>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("tools", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; a later registration for the same tool replaces the earlier one.
    pub fn register<F>(&mut self, tool: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Adapter> + Send + Sync + 'static,
    {
        self.factories.insert(tool.into(), Box::new(factory));
        self
    }

    /// Register a shared instance under its own tool id.
    pub fn register_instance(&mut self, adapter: Arc<dyn Adapter>) -> &mut Self {
        let tool = adapter.tool().to_string();
        self.register(tool, move || Arc::clone(&adapter))
    }

    pub fn create(&self, tool: &str) -> Option<Arc<dyn Adapter>> {
        self.factories.get(tool).map(|factory| factory())
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.factories.contains_key(tool)
    }

    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// One [`CommandAdapter`] per spec, sharing `runner`.
    pub fn from_specs(
        specs: &BTreeMap<String, ToolSpec>,
        runner: Arc<dyn ProcessRunner>,
        timeout: Option<Duration>,
    ) -> Self {
        let mut registry = Self::new();
        for (tool, spec) in specs {
            let tool_id = tool.clone();
            let spec = spec.clone();
            let runner = Arc::clone(&runner);
            registry.register(tool.clone(), move || -> Arc<dyn Adapter> {
                Arc::new(
                    CommandAdapter::new(tool_id.clone(), spec.clone(), Arc::clone(&runner))
                        .with_timeout(timeout),
                )
            });
        }
        registry
    }
}

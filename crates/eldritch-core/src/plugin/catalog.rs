//! Named plugin modules available to a build.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::EldritchPlugin;

/// A unit of plugin code, named in configuration.
pub trait PluginModule: Send + Sync {
    /// Instantiate every plugin the module exports, in declaration order.
    fn load(&self) -> anyhow::Result<Vec<Box<dyn EldritchPlugin>>>;
}

impl<F> PluginModule for F
where
    F: Fn() -> anyhow::Result<Vec<Box<dyn EldritchPlugin>>> + Send + Sync,
{
    fn load(&self) -> anyhow::Result<Vec<Box<dyn EldritchPlugin>>> {
        self()
    }
}

/// Maps module names to the modules linked into this binary.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    modules: BTreeMap<String, Arc<dyn PluginModule>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_module(mut self, name: impl Into<String>, module: impl PluginModule + 'static) -> Self {
        self.register(name, module);
        self
    }

    /// Make `module` resolvable as `name`, replacing any earlier entry.
    pub fn register(&mut self, name: impl Into<String>, module: impl PluginModule + 'static) {
        self.modules.insert(name.into(), Arc::new(module));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PluginModule>> {
        self.modules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Module names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog").field("modules", &self.names()).finish()
    }
}

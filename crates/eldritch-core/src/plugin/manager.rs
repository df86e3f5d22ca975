//! Plugin registration and hook dispatch.

use std::sync::Arc;

use eldritch_common_log::spans;
use tracing::debug;

use super::{EldritchPlugin, Hook, PluginCatalog, PluginError, Result};
use crate::context::RuntimeContext;

/// One registered hook implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRegistration {
    /// Module name as written in configuration.
    pub module: String,
    /// Implementation name within the module.
    pub name: String,
    /// `module.name`; unique per manager.
    pub key: String,
}

impl PluginRegistration {
    fn new(module: &str, name: &str) -> Self {
        Self {
            module: module.to_string(),
            name: name.to_string(),
            key: format!("{module}.{name}"),
        }
    }
}

struct Registered {
    registration: PluginRegistration,
    plugin: Box<dyn EldritchPlugin>,
}

/// Loads plugin modules and calls their hooks in registration order.
pub struct PluginManager {
    catalog: PluginCatalog,
    plugins: Vec<Registered>,
}

impl PluginManager {
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            catalog,
            plugins: Vec::new(),
        }
    }

    /// Load every module in `modules`, in order.
    ///
    /// Stops at the first module that fails. Modules before it stay registered;
    /// the failing module contributes nothing.
    pub fn load_plugins<S: AsRef<str>>(&mut self, modules: &[S]) -> Result<()> {
        for module in modules {
            self.load_module(module.as_ref())?;
        }
        Ok(())
    }

    /// Resolve one module through the catalog and register its exports.
    pub fn load_module(&mut self, module: &str) -> Result<()> {
        let source = self.catalog.get(module).ok_or_else(|| PluginError::Load {
            module: module.to_string(),
            source: anyhow::anyhow!(
                "no plugin module named `{module}` is available (known: {})",
                self.known_modules()
            ),
        })?;

        let exports = source.load().map_err(|source| PluginError::Load {
            module: module.to_string(),
            source,
        })?;
        self.register_module(module, exports)
    }

    /// Register already instantiated plugins under `module`.
    ///
    /// All or nothing: a duplicate key rejects the whole batch.
    pub fn register_module(&mut self, module: &str, exports: Vec<Box<dyn EldritchPlugin>>) -> Result<()> {
        let mut batch: Vec<Registered> = Vec::with_capacity(exports.len());
        for plugin in exports {
            let registration = PluginRegistration::new(module, plugin.name());
            let taken = self
                .plugins
                .iter()
                .chain(batch.iter())
                .any(|r| r.registration.key == registration.key);
            if taken {
                return Err(PluginError::Duplicate { key: registration.key });
            }
            batch.push(Registered { registration, plugin });
        }

        for registered in &batch {
            debug!(plugin = %registered.registration.key, "plugin registered");
        }
        self.plugins.extend(batch);
        Ok(())
    }

    /// Call `hook` on every registered plugin, in order, passing `ctx`.
    ///
    /// The first failure aborts the dispatch; plugins already called keep
    /// whatever effect they had.
    pub fn dispatch(&self, hook: Hook, ctx: &Arc<RuntimeContext>) -> Result<()> {
        for Registered { registration, plugin } in &self.plugins {
            let span = spans::hook_span(hook.as_str(), &registration.key);
            let _span = span.enter();
            let _scope = ctx.enter();

            let outcome = match hook {
                Hook::OnCommandLineCreate => plugin.on_command_line_create(ctx),
            };
            if let Err(source) = outcome {
                debug!(error = %source, "hook failed");
                return Err(PluginError::HookExecution {
                    hook,
                    plugin_key: registration.key.clone(),
                    source,
                });
            }
        }
        Ok(())
    }

    pub fn registrations(&self) -> impl Iterator<Item = &PluginRegistration> {
        self.plugins.iter().map(|r| &r.registration)
    }

    /// Registration keys, in order.
    pub fn keys(&self) -> Vec<&str> {
        self.registrations().map(|r| r.key.as_str()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&dyn EldritchPlugin> {
        self.plugins
            .iter()
            .find(|r| r.registration.key == key)
            .map(|r| r.plugin.as_ref())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    fn known_modules(&self) -> String {
        let names = self.catalog.names();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("catalog", &self.catalog)
            .field("plugins", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginModule;

    struct Named(&'static str);

    impl EldritchPlugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn on_command_line_create(&self, _ctx: &Arc<RuntimeContext>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Exports(&'static [&'static str]);

    impl PluginModule for Exports {
        fn load(&self) -> anyhow::Result<Vec<Box<dyn EldritchPlugin>>> {
            Ok(self
                .0
                .iter()
                .map(|name| Box::new(Named(*name)) as Box<dyn EldritchPlugin>)
                .collect())
        }
    }

    struct Broken;

    impl PluginModule for Broken {
        fn load(&self) -> anyhow::Result<Vec<Box<dyn EldritchPlugin>>> {
            anyhow::bail!("import failed")
        }
    }

    fn catalog() -> PluginCatalog {
        PluginCatalog::new()
            .with_module("a", Exports(&["ModA"]))
            .with_module("b", Exports(&["ModB", "Extra"]))
            .with_module("twin", Exports(&["Same", "Same"]))
            .with_module("broken", Broken)
    }

    #[test]
    fn test_keys_follow_module_then_export_order() {
        let mut manager = PluginManager::new(catalog());
        manager.load_plugins(&["b", "a"]).unwrap();
        assert_eq!(manager.keys(), vec!["b.ModB", "b.Extra", "a.ModA"]);
        assert_eq!(manager.len(), 3);
    }

    #[test]
    fn test_unknown_module_names_the_module() {
        let mut manager = PluginManager::new(catalog());
        let err = manager.load_plugins(&["nonexistent.module"]).unwrap_err();
        match &err {
            PluginError::Load { module, .. } => assert_eq!(module, "nonexistent.module"),
            other => panic!("Expected Load, got {other:?}"),
        }
        assert!(err.to_string().contains("nonexistent.module"));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_module_load_failure_is_wrapped() {
        let mut manager = PluginManager::new(catalog());
        let err = manager.load_plugins(&["a", "broken"]).unwrap_err();
        assert!(matches!(err, PluginError::Load { ref module, .. } if module == "broken"));
        assert_eq!(manager.keys(), vec!["a.ModA"]);
    }

    #[test]
    fn test_loading_a_module_twice_is_a_duplicate() {
        let mut manager = PluginManager::new(catalog());
        let err = manager.load_plugins(&["a", "a"]).unwrap_err();
        assert!(matches!(err, PluginError::Duplicate { ref key } if key == "a.ModA"));
        assert_eq!(err.plugin_key(), Some("a.ModA"));
    }

    #[test]
    fn test_duplicate_within_module_rejects_whole_module() {
        let mut manager = PluginManager::new(catalog());
        assert!(manager.load_plugins(&["twin"]).is_err());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_get_by_key() {
        let mut manager = PluginManager::new(catalog());
        manager.load_module("b").unwrap();
        assert_eq!(manager.get("b.Extra").map(|p| p.name()), Some("Extra"));
        assert!(manager.get("b.Missing").is_none());
        let registration = manager.registrations().next().unwrap();
        assert_eq!(registration.module, "b");
        assert_eq!(registration.name, "ModB");
    }
}

//! Plugin modules linked into the binary.

use eldritch_core::PluginCatalog;

/// Every module `[tool.eldritch] plugins` may name.
pub fn catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    eldritch_plugin_license::register(&mut catalog);
    catalog
}

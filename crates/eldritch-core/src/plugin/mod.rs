//! Plugin system for Eldritch
//!
//! Plugins extend the command line. A project lists plugin *modules* in
//! `[tool.eldritch] plugins`; each module exports one or more
//! [`EldritchPlugin`] implementations, which are registered in order and then
//! called back through [`PluginManager::dispatch`].
//!
//! ## Resolution
//!
//! Modules are linked into the binary and named in a [`PluginCatalog`]:
//! ```text
//! "eldritch.plugins.license"  ->  LicenseModule  ->  [LicensePlugin]
//!                                                      key: eldritch.plugins.license.LicensePlugin
//! ```

mod catalog;
mod hook;
mod manager;

pub use catalog::{PluginCatalog, PluginModule};
pub use hook::{EldritchPlugin, Hook};
pub use manager::{PluginManager, PluginRegistration};

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;

/// Errors that can occur in the plugin system
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// A configured module could not be resolved or refused to load.
    #[error("failed to load plugin module `{module}`: {source}")]
    Load {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    /// The same plugin key was registered twice.
    #[error("plugin `{key}` is already registered")]
    Duplicate { key: String },

    /// A plugin's hook implementation failed.
    #[error("plugin `{plugin_key}` failed in `{hook}`: {source}")]
    HookExecution {
        hook: Hook,
        plugin_key: String,
        #[source]
        source: anyhow::Error,
    },

    /// A subcommand name is already taken on the command line.
    #[error("command `{name}` is already registered")]
    CommandConflict { name: String },
}

impl PluginError {
    /// Key of the plugin this error is about, when there is one.
    pub fn plugin_key(&self) -> Option<&str> {
        match self {
            Self::Duplicate { key } => Some(key),
            Self::HookExecution { plugin_key, .. } => Some(plugin_key),
            Self::Load { .. } | Self::CommandConflict { .. } => None,
        }
    }
}

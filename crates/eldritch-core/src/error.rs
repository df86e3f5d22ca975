//! Error types for the runtime core.

use eldritch_common_config::ConfigError;
use thiserror::Error;

use crate::context::ContextId;
use crate::plugin::PluginError;

/// Errors raised while building or using a [`RuntimeContext`](crate::RuntimeContext).
#[derive(Debug, Error)]
pub enum ContextError {
    /// A component asked for its context but none was reachable. This is a
    /// wiring bug: the component was built without ever being tied to a context.
    #[error("no runtime context is reachable from here")]
    ContextNotFound,

    /// A component's factory asked for the same component again.
    #[error("reentrant construction of `{component}` in context {context}")]
    ReentrantConstruction {
        component: &'static str,
        context: ContextId,
    },

    /// A component factory failed.
    #[error("failed to construct `{component}`: {source}")]
    Component {
        component: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("no handler is registered for command `{path}`")]
    UnknownCommand { path: String },

    #[error("command `{path}` failed: {source}")]
    Command {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContextError {
    /// Wrap a factory failure for component type `T`.
    pub fn component<T>(source: impl Into<anyhow::Error>) -> Self {
        Self::Component {
            component: std::any::type_name::<T>(),
            source: source.into(),
        }
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, ContextError>;

//! Runtime core for Eldritch
//!
//! This crate provides:
//! - **RuntimeContext**: the per-run aggregate of configuration, console,
//!   plugins and command line
//! - **Context-scoped components**: at most one instance of a type per context
//! - **Context lookup**: explicit sources with a thread-local scope fallback
//! - **Plugins**: module catalog, registration and hook dispatch
//! - **Rendering**: Handlebars templates written into the project
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized -> ConfigLoaded -> PluginsLoaded -> CommandLineReady
//!   read pyproject   load modules    on_command_line_create
//! ```

pub mod command_line;
pub mod console;
pub mod context;
pub mod error;
pub mod locate;
pub mod plugin;
pub mod project;
pub mod render;
pub mod scoped;
pub mod templates;

pub use command_line::{CommandGroup, CommandHandler, CommandLine, CommandSpec, ExitStatus};
pub use console::{Console, ConsoleBuffer};
pub use context::{ContextBuilder, ContextId, ContextState, RuntimeContext};
pub use error::{ContextError, Result};
pub use locate::{current, locate, ContextBound, ContextRef, ContextScope, ContextSource};
pub use plugin::{
    EldritchPlugin, Hook, PluginCatalog, PluginError, PluginManager, PluginModule,
    PluginRegistration,
};
pub use project::ProjectDirs;
pub use render::{RenderContext, RenderEntry, RenderError, RenderedFile, Renderer};
pub use scoped::{ContextComponent, ScopedRegistry};
pub use templates::{TemplateEngine, TemplateError};

/// Re-exported so plugins build commands against the same clap version.
pub use clap;

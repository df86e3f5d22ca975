//! Extension points.

use std::fmt;
use std::sync::Arc;

use crate::context::RuntimeContext;

/// A named extension point plugins implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Runs once per context, after plugins are loaded, so plugins can attach
    /// subcommands to [`RuntimeContext::command_line`].
    OnCommandLineCreate,
}

impl Hook {
    pub const ALL: [Hook; 1] = [Hook::OnCommandLineCreate];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnCommandLineCreate => "on_command_line_create",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook implementation exported by a plugin module.
///
/// The context is always passed in; plugins must not stash a strong reference
/// to it.
pub trait EldritchPlugin: Send + Sync {
    /// Implementation name, unique within its module.
    fn name(&self) -> &str;

    fn on_command_line_create(&self, ctx: &Arc<RuntimeContext>) -> anyhow::Result<()>;
}

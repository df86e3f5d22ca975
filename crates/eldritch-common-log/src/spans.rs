//! Span helpers shared by the runtime.

use tracing::{debug_span, info_span, Span};

/// Span covering everything done on behalf of one runtime context.
pub fn context_span(context_id: u64) -> Span {
    info_span!("context", id = context_id)
}

/// Span for one plugin hook invocation.
pub fn hook_span(hook: &str, plugin_key: &str) -> Span {
    debug_span!("hook", name = %hook, plugin = %plugin_key)
}

/// Span for one subcommand run.
pub fn command_span(path: &str) -> Span {
    info_span!("command", path = %path)
}

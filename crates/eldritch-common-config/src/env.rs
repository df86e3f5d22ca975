//! Environment variable handling.

use std::env;
use std::path::PathBuf;

/// Environment variable names.
pub mod vars {
    pub const ELDRITCH_PROJECT_DIR: &str = "ELDRITCH_PROJECT_DIR";
    pub const ELDRITCH_LOG_LEVEL: &str = "ELDRITCH_LOG_LEVEL";
    pub const ELDRITCH_LOG_FORMAT: &str = "ELDRITCH_LOG_FORMAT";
    pub const ELDRITCH_LOG_FILE: &str = "ELDRITCH_LOG_FILE";
    pub const ELDRITCH_LOG_SOURCE: &str = "ELDRITCH_LOG_SOURCE";
    pub const ELDRITCH_LOG_SPANS: &str = "ELDRITCH_LOG_SPANS";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const NO_COLOR: &str = "NO_COLOR";
}

/// Typed access to environment variables.
pub struct Environment;

impl Environment {
    /// Get an optional string variable; empty values count as unset.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok().filter(|v| !v.is_empty())
    }

    /// Get a boolean variable.
    pub fn get_bool(var: &str) -> Option<bool> {
        Self::get(var).map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
    }

    /// Project directory: `ELDRITCH_PROJECT_DIR`, else the working directory.
    pub fn project_dir() -> PathBuf {
        Self::get(vars::ELDRITCH_PROJECT_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| env::current_dir().unwrap_or_default())
    }
}

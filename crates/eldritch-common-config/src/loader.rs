//! `pyproject.toml` loading and parsing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::lock::FileLock;
use crate::types::{EldritchConfig, ProjectInfo, PyProject};

/// Name of the project file Eldritch reads.
pub const PYPROJECT_FILE: &str = "pyproject.toml";

/// How long a reader waits for a sibling process to release the project file.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out waiting for lock {path}")]
    LockTimeout { path: PathBuf },

    #[error("invalid TOML in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: String, message: String },
}

/// Loads `pyproject.toml` from a project directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base_path: PathBuf,
    filename: String,
    lock_timeout: Duration,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
            filename: PYPROJECT_FILE.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Read a differently named file from the same directory.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the file this loader reads.
    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(&self.filename)
    }

    /// Path of the sidecar lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.base_path.join(format!("{}.lock", self.filename))
    }

    /// Read and parse the project file.
    ///
    /// A missing file is an error: Eldritch always runs inside a project.
    pub fn load(&self) -> Result<PyProject, ConfigError> {
        let content = self.read_locked()?;
        let pyproject = parse_pyproject(&content, &self.config_path())?;
        debug!(
            path = %self.config_path().display(),
            plugins = pyproject.eldritch.plugins.len(),
            "Eldritch config was loaded"
        );
        Ok(pyproject)
    }

    /// Read the raw file text while holding the lock.
    ///
    /// Parsing happens after the lock is released to keep the critical
    /// section short.
    fn read_locked(&self) -> Result<String, ConfigError> {
        let config_path = self.config_path();
        if !config_path.is_file() {
            return Err(ConfigError::NotFound { path: config_path });
        }

        let lock_path = self.lock_path();
        let _lock = FileLock::exclusive(&lock_path, self.lock_timeout).map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                ConfigError::LockTimeout { path: lock_path.clone() }
            } else {
                ConfigError::Read { path: lock_path.clone(), source: e }
            }
        })?;

        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path,
            source,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

/// Parse `pyproject.toml` text. `path` is only used in error messages.
pub fn parse_pyproject(content: &str, path: &Path) -> Result<PyProject, ConfigError> {
    let document: toml::Table = content.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;

    let mut pyproject = PyProject {
        document,
        ..PyProject::default()
    };

    pyproject.eldritch = match pyproject.tool_table("eldritch") {
        Some(table) => section::<EldritchConfig>(table, "tool.eldritch")?,
        None => EldritchConfig::default(),
    };
    pyproject.project = match pyproject.tool_table("poetry") {
        Some(table) => section::<ProjectInfo>(table, "tool.poetry")?,
        None => ProjectInfo::default(),
    };

    validate(&pyproject.eldritch)?;
    Ok(pyproject)
}

fn section<T: serde::de::DeserializeOwned>(table: &toml::Table, key: &str) -> Result<T, ConfigError> {
    toml::Value::Table(table.clone())
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Invalid {
            key: key.to_string(),
            message: e.message().to_string(),
        })
}

/// Dotted identifiers such as `eldritch.plugins.license`.
static PLUGIN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("plugin name pattern compiles")
});

fn validate(config: &EldritchConfig) -> Result<(), ConfigError> {
    for name in &config.plugins {
        if !PLUGIN_NAME.is_match(name) {
            return Err(ConfigError::Invalid {
                key: "tool.eldritch.plugins".to_string(),
                message: format!("`{name}` is not a valid plugin module name"),
            });
        }
    }

    Ok(())
}

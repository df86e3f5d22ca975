//! CLI error handling and formatting.

use std::io;
use std::process::ExitCode;

use eldritch_common_config::ConfigError;
use eldritch_core::{ContextError, ExitStatus, PluginError, RenderError, TemplateError};
use eldritch_plugin_license::LicenseError;
use thiserror::Error;

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{message}")]
    Config {
        message: String,
        #[source]
        source: ConfigError,
        hint: Option<String>,
    },

    #[error("{message}")]
    Plugin {
        message: String,
        plugin_key: Option<String>,
        #[source]
        source: PluginError,
    },

    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error("{message}")]
    Usage { message: String },

    #[error("{message}")]
    Template { message: String },

    #[error("{message}")]
    Command {
        message: String,
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "E001",
            Self::Plugin { .. } => "E002",
            Self::Io { .. } => "E003",
            Self::Usage { .. } => "E004",
            Self::Template { .. } => "E005",
            Self::Command { .. } => "E006",
            Self::Other(_) => "E999",
        }
    }

    pub fn status(&self) -> ExitStatus {
        match self {
            Self::Config { .. } => ExitStatus::CONFIG,
            Self::Plugin { .. } => ExitStatus::PLUGIN,
            Self::Io { .. } => ExitStatus::IO,
            Self::Usage { .. } => ExitStatus::USAGE,
            Self::Template { .. } => ExitStatus::TEMPLATE,
            Self::Command { .. } | Self::Other(_) => ExitStatus::FAILURE,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        self.status().into()
    }

    /// Get hint for this error if available
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { hint, .. } => hint.as_deref(),
            Self::Plugin {
                source: PluginError::Load { .. },
                ..
            } => Some("Check the module names under [tool.eldritch] plugins"),
            _ => None,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Classify a failed command by what its handler returned.
    fn from_command(command: String, source: anyhow::Error) -> Self {
        if let Some(err) = source.downcast_ref::<RenderError>() {
            match err {
                RenderError::UnknownEntry { .. } => return Self::usage(err.to_string()),
                RenderError::Template(_) | RenderError::Metadata { .. } => {
                    return Self::Template { message: err.to_string() }
                }
                RenderError::Io { .. } | RenderError::Context(_) => {}
            }
        }
        if let Some(err) = source.downcast_ref::<LicenseError>() {
            match err {
                LicenseError::Unknown { .. } => return Self::usage(err.to_string()),
                LicenseError::Template(_) => return Self::Template { message: err.to_string() },
                LicenseError::Io { .. } | LicenseError::Context(_) => {}
            }
        }
        if source.downcast_ref::<TemplateError>().is_some() {
            return Self::Template {
                message: source.to_string(),
            };
        }
        if has_io_cause(&source) {
            return Self::Io {
                message: format!("`{command}` failed: {source}"),
                source: io::Error::new(io::ErrorKind::Other, source.to_string()),
            };
        }
        Self::Command {
            message: format!("`{command}` failed: {source}"),
            command,
            source,
        }
    }
}

fn has_io_cause(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.is::<io::Error>())
}

impl From<ContextError> for CliError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Config(source) => {
                let hint = match &source {
                    ConfigError::NotFound { .. } => {
                        Some("Run eldritch inside a project or pass --project-dir".to_string())
                    }
                    ConfigError::LockTimeout { .. } => {
                        Some("Another eldritch process is holding the project lock".to_string())
                    }
                    _ => None,
                };
                Self::Config {
                    message: format!("Configuration error: {source}"),
                    source,
                    hint,
                }
            }
            ContextError::Plugin(source) => Self::Plugin {
                message: format!("Plugin error: {source}"),
                plugin_key: source.plugin_key().map(str::to_string),
                source,
            },
            ContextError::Io(source) => Self::Io {
                message: source.to_string(),
                source,
            },
            ContextError::Command { path, source } => Self::from_command(path, source),
            other => Self::Other(other.into()),
        }
    }
}

/// Print an error, its causes and a hint to stderr.
pub fn report(error: &CliError) {
    eprintln!("Error [{}]: {error}", error.code());
    let mut cause = std::error::Error::source(error);
    while let Some(err) = cause {
        eprintln!("  caused by: {err}");
        cause = err.source();
    }
    if let Some(hint) = error.hint() {
        eprintln!("hint: {hint}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_config_errors_exit_with_config_status() {
        let err = CliError::from(ContextError::Config(ConfigError::NotFound {
            path: PathBuf::from("/p/pyproject.toml"),
        }));
        assert_eq!(err.status(), ExitStatus::CONFIG);
        assert_eq!(err.code(), "E001");
        assert!(err.hint().unwrap().contains("--project-dir"));
    }

    #[test]
    fn test_plugin_errors_keep_the_key() {
        let err = CliError::from(ContextError::Plugin(PluginError::HookExecution {
            hook: eldritch_core::Hook::OnCommandLineCreate,
            plugin_key: "a.ModA".into(),
            source: anyhow::anyhow!("boom"),
        }));
        assert_eq!(err.status(), ExitStatus::PLUGIN);
        match err {
            CliError::Plugin { plugin_key, message, .. } => {
                assert_eq!(plugin_key.as_deref(), Some("a.ModA"));
                assert!(message.contains("a.ModA"));
            }
            other => panic!("Expected Plugin, got {other:?}"),
        }
    }

    #[test]
    fn test_load_errors_have_a_hint() {
        let err = CliError::from(ContextError::Plugin(PluginError::Load {
            module: "missing".into(),
            source: anyhow::anyhow!("not found"),
        }));
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_command_errors_are_classified() {
        let unknown = RenderError::UnknownEntry {
            name: "x".into(),
            known: vec!["pyproject.toml".into()],
        };
        let err = CliError::from(ContextError::Command {
            path: "render".into(),
            source: unknown.into(),
        });
        assert_eq!(err.status(), ExitStatus::USAGE);

        let err = CliError::from(ContextError::Command {
            path: "render".into(),
            source: TemplateError::NotFound("t".into()).into(),
        });
        assert_eq!(err.status(), ExitStatus::TEMPLATE);

        let err = CliError::from(ContextError::Command {
            path: "license use".into(),
            source: anyhow::Error::new(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
        });
        assert_eq!(err.status(), ExitStatus::IO);

        let err = CliError::from(ContextError::Command {
            path: "license list".into(),
            source: anyhow::anyhow!("something else"),
        });
        assert_eq!(err.status(), ExitStatus::FAILURE);
    }

    #[test]
    fn test_wiring_errors_are_general_failures() {
        let err = CliError::from(ContextError::ContextNotFound);
        assert_eq!(err.status(), ExitStatus::FAILURE);
        assert_eq!(err.code(), "E999");
    }
}

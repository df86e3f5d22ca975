//! Logging infrastructure for Eldritch.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use eldritch_common_config::{vars, Environment};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Span helpers.
pub mod spans;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Log file path (if file logging enabled).
    pub file_path: Option<PathBuf>,
    /// Include source location.
    pub source_location: bool,
    /// Include span events.
    pub span_events: bool,
    /// Use ANSI colours on stderr.
    pub ansi: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl From<LogLevel> for tracing_subscriber::filter::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
            LogLevel::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
            LogLevel::Info => tracing_subscriber::filter::LevelFilter::INFO,
            LogLevel::Warn => tracing_subscriber::filter::LevelFilter::WARN,
            LogLevel::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        }
    }
}

impl LogLevel {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Map `-v` counts onto a level; `quiet` wins.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        match verbose {
            0 if quiet => Self::Error,
            0 => Self::Warn,
            1 => Self::Info,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON structured format.
    Json,
}

impl LogFormat {
    /// Anything other than `json` or `compact` reads as pretty.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            file_path: None,
            source_location: false,
            span_events: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Defaults overridden by `ELDRITCH_LOG_*`, `RUST_LOG` and `NO_COLOR`.
    ///
    /// `ELDRITCH_LOG_LEVEL` wins over `RUST_LOG`; unparseable values keep the
    /// default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let level = Environment::get(vars::ELDRITCH_LOG_LEVEL)
            .or_else(|| Environment::get(vars::RUST_LOG))
            .and_then(|level| LogLevel::parse(&level))
            .unwrap_or(defaults.level);

        Self {
            level,
            format: Environment::get(vars::ELDRITCH_LOG_FORMAT)
                .map_or(defaults.format, |format| LogFormat::parse(&format)),
            file_path: Environment::get(vars::ELDRITCH_LOG_FILE).map(PathBuf::from),
            source_location: Environment::get_bool(vars::ELDRITCH_LOG_SOURCE)
                .unwrap_or(defaults.source_location),
            span_events: Environment::get_bool(vars::ELDRITCH_LOG_SPANS).unwrap_or(defaults.span_events),
            ansi: Environment::get(vars::NO_COLOR).is_none(),
        }
    }

    /// Override the level, e.g. from command-line verbosity flags.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}

/// Initialize logging with the given configuration.
///
/// Logs go to stderr so they never mix with command output on stdout.
pub fn init(config: LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let span_events = || {
        if config.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    };

    let stderr_layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(config.ansi)
            .with_target(true)
            .with_file(config.source_location)
            .with_line_number(config.source_location)
            .with_span_events(span_events())
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_ansi(config.ansi)
            .with_span_events(span_events())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_span_events(span_events())
            .boxed(),
    };

    let file_layer = match &config.file_path {
        Some(file_path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_span_events(span_events());

            Some(match config.format {
                LogFormat::Json => layer.json().boxed(),
                _ => layer.boxed(),
            })
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(filter)
        .try_init()
        .map_err(|e| LogError::InitError(e.to_string()))
}

/// Logging errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to initialize logging: {0}")]
    InitError(String),

    #[error("failed to open log file: {0}")]
    FileError(#[from] io::Error),
}

/// Convenience macros re-exported from tracing.
pub use tracing::{debug, error, info, trace, warn};

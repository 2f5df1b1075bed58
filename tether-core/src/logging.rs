//! Logging setup for applications built on Tether.
//!
//! The pipeline itself only emits `tracing` events. This module wires up a
//! subscriber for callers that don't bring their own: JSON to STDOUT by
//! default, with plain, pretty and compact formats and file outputs.
//!
//! # Examples
//!
//! ```no_run
//! use tether_core::logging::*;
//!
//! # fn main() -> tether_core::Result<()> {
//! let _guard = LogConfig::new()
//!     .level(LogLevel::Debug)
//!     .format(LogFormat::Pretty)
//!     .with_env_filter("tether_core=trace,tether_http_client=debug")
//!     .init()?;
//!
//! info!("Logging initialized");
//! # Ok(())
//! # }
//! ```
//!
//! Settings can also come from the environment:
//!
//! ```no_run
//! use tether_core::logging::LogConfig;
//!
//! # fn main() -> tether_core::Result<()> {
//! // TETHER_LOG_LEVEL=debug TETHER_LOG_FORMAT=compact
//! let _guard = LogConfig::from_env()?.init()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use std::env;
use std::io;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use tracing::{debug, error, info, trace, warn};
pub use tracing_appender;

/// Environment variable holding the log level.
pub const ENV_LEVEL: &str = "TETHER_LOG_LEVEL";
/// Environment variable holding the log format.
pub const ENV_FORMAT: &str = "TETHER_LOG_FORMAT";
/// Environment variable holding a full filter directive.
pub const ENV_FILTER: &str = "TETHER_LOG_FILTER";

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Per-plugin steps and transport swaps
    Trace,
    /// Phase and dispatch milestones
    Debug,
    Info,
    /// Retry exhaustion, redirect limits
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Convert to string for EnvFilter
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::Logging(format!("unknown log level '{other}'"))),
        }
    }
}

/// Output format for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured, machine-readable (default)
    Json,
    Plain,
    /// Multi-line, for development
    Pretty,
    Compact,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "plain" | "text" => Ok(LogFormat::Plain),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(Error::Logging(format!("unknown log format '{other}'"))),
        }
    }
}

/// Output destination for logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Append to a single file
    File(String),
    /// Write to rotating log files
    RollingFile {
        directory: String,
        prefix: String,
        rotation: Rotation,
    },
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl Rotation {
    fn to_tracing_rotation(self) -> tracing_appender::rolling::Rotation {
        match self {
            Rotation::Minutely => tracing_appender::rolling::Rotation::MINUTELY,
            Rotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
            Rotation::Daily => tracing_appender::rolling::Rotation::DAILY,
            Rotation::Never => tracing_appender::rolling::Rotation::NEVER,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Include thread IDs
    pub thread_ids: bool,
    /// Include target (module path)
    pub targets: bool,
    /// Include file and line numbers
    pub file_line: bool,
    /// Emit span close events
    pub spans: bool,
    /// Enable ANSI colors (ignored for JSON)
    pub colors: bool,
    /// Custom filter directive, overrides `level` when set
    pub env_filter: Option<String>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `TETHER_LOG_LEVEL`, `TETHER_LOG_FORMAT`
    /// and `TETHER_LOG_FILTER`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(level) = lookup(ENV_LEVEL) {
            config.level = level.parse()?;
        }
        if let Some(format) = lookup(ENV_FORMAT) {
            config.format = format.parse()?;
            config.colors = config.format != LogFormat::Json;
        }
        if let Some(filter) = lookup(ENV_FILTER).filter(|f| !f.trim().is_empty()) {
            config.env_filter = Some(filter);
        }
        Ok(config)
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.thread_ids = enable;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    pub fn with_file_line(mut self, enable: bool) -> Self {
        self.file_line = enable;
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.spans = enable;
        self
    }

    pub fn with_colors(mut self, enable: bool) -> Self {
        self.colors = enable;
        self
    }

    /// Set a filter directive such as `"tether_core=trace,hyper=info"`.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn build_filter(&self) -> Result<EnvFilter> {
        match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive)
                .map_err(|e| Error::Logging(format!("invalid filter '{directive}': {e}"))),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Install the global subscriber.
    ///
    /// The returned guard flushes buffered output when dropped and must be
    /// kept alive. Fails if a subscriber is already installed, the filter is
    /// invalid, or the log file can't be opened.
    pub fn init(self) -> Result<WorkerGuard> {
        let filter = self.build_filter()?;

        let (writer, guard) = match &self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| Error::Logging(format!("cannot open '{path}': {e}")))?;
                tracing_appender::non_blocking(file)
            }
            LogOutput::RollingFile {
                directory,
                prefix,
                rotation,
            } => tracing_appender::non_blocking(tracing_appender::rolling::RollingFileAppender::new(
                rotation.to_tracing_rotation(),
                directory,
                prefix,
            )),
        };

        self.init_with_writer(writer, filter)?;
        Ok(guard)
    }

    fn init_with_writer<W>(&self, writer: W, filter: EnvFilter) -> Result<()>
    where
        W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
    {
        let span_events = if self.spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match self.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_current_span(self.spans)
                        .with_span_list(self.spans)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Plain => registry
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_ansi(self.colors)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_ansi(self.colors)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_ansi(self.colors)
                        .with_span_events(span_events),
                )
                .try_init(),
        };

        installed.map_err(|e| Error::Logging(e.to_string()))
    }
}

impl Default for LogConfig {
    /// JSON to STDOUT at INFO level.
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            thread_ids: false,
            targets: true,
            file_line: false,
            spans: false,
            colors: false,
            env_filter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Trace.to_tracing_level(), Level::TRACE);
        assert_eq!(LogLevel::Warn.to_tracing_level(), Level::WARN);
        assert_eq!(LogLevel::Error.as_str(), "error");
    }

    #[test]
    fn test_parse_level_and_format() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!(matches!("loud".parse::<LogLevel>(), Err(Error::Logging(_))));
        assert!(matches!("xml".parse::<LogFormat>(), Err(Error::Logging(_))));
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stdout);
        assert!(config.targets);
        assert!(config.env_filter.is_none());
    }

    #[test]
    fn test_config_from_env() {
        let config = LogConfig::from_lookup(lookup(&[
            (ENV_LEVEL, "trace"),
            (ENV_FORMAT, "pretty"),
            (ENV_FILTER, "tether_core=trace"),
        ]))
        .unwrap();
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.colors);
        assert_eq!(config.env_filter.as_deref(), Some("tether_core=trace"));
    }

    #[test]
    fn test_config_from_env_rejects_bad_level() {
        let err = LogConfig::from_lookup(lookup(&[(ENV_LEVEL, "chatty")])).unwrap_err();
        assert!(err.to_string().contains("chatty"));
    }

    #[test]
    fn test_invalid_filter_is_error() {
        let config = LogConfig::new().with_env_filter("tether_core=loud");
        assert!(matches!(config.build_filter(), Err(Error::Logging(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .level(LogLevel::Debug)
            .format(LogFormat::Plain)
            .with_colors(true)
            .with_targets(false);

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Plain);
        assert!(config.colors);
        assert!(!config.targets);
    }
}

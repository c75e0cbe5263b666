//! Logging infrastructure for SOC Guard.
//!
//! This module provides structured logging using the tracing ecosystem.

use std::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crates whose events are enabled by the default filter.
const FILTERED_CRATES: &[&str] = &["sg_core", "sg_observability", "sg_cli"];

/// Errors raised while setting up logging.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// A global subscriber was already installed.
    #[error("Failed to install log subscriber: {0}")]
    AlreadyInitialized(String),

    #[error("Unknown logging preset '{0}' (expected default, development or production)")]
    UnknownPreset(String),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level.
    pub level: Level,
    /// Whether to use JSON format.
    pub json_format: bool,
    /// Whether to include span events.
    pub include_spans: bool,
    /// Whether to include file/line info.
    pub include_location: bool,
    pub include_thread_ids: bool,
    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: false,
            include_location: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose text output for local runs.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            include_spans: true,
            include_location: true,
            include_thread_ids: true,
            ..Self::default()
        }
    }

    /// JSON output for log aggregation.
    pub fn production() -> Self {
        Self {
            json_format: true,
            ..Self::default()
        }
    }

    /// Returns a copy logging at `level`.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> String {
        FILTERED_CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for LoggingConfig {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" | "text" => Ok(Self::default()),
            "development" | "dev" => Ok(Self::development()),
            "production" | "prod" | "json" => Ok(Self::production()),
            _ => Err(LoggingError::UnknownPreset(s.to_string())),
        }
    }
}

/// Initializes the logging system with default configuration.
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LoggingConfig::default())
}

/// Initializes the logging system with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging_with_config(config: LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_target(config.include_target)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_target(config.include_target)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };

    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(LoggingConfig::default().level, Level::INFO);
        assert!(!LoggingConfig::default().json_format);

        let dev = LoggingConfig::development();
        assert_eq!(dev.level, Level::DEBUG);
        assert!(dev.include_location);

        let prod = LoggingConfig::production();
        assert_eq!(prod.level, Level::INFO);
        assert!(prod.json_format);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("prod".parse::<LoggingConfig>().unwrap(), LoggingConfig::production());
        assert_eq!("Development".parse::<LoggingConfig>().unwrap(), LoggingConfig::development());
        assert!(matches!(
            "verbose".parse::<LoggingConfig>(),
            Err(LoggingError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_default_directive() {
        let config = LoggingConfig::default().with_level(Level::WARN);
        assert_eq!(
            config.default_directive(),
            "sg_core=WARN,sg_observability=WARN,sg_cli=WARN"
        );
    }

    #[test]
    fn test_second_init_fails() {
        // First call may race with other tests; the second must fail either way
        let _ = init_logging();
        assert!(matches!(
            init_logging(),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }
}

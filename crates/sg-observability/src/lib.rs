//! # sg-observability
//!
//! Logging and metrics infrastructure for SOC Guard.
//!
//! This crate sets up structured logging with tracing and exposes the guard
//! metrics through a Prometheus recorder.

pub mod logging;
pub mod metrics;

pub use self::logging::{init_logging, init_logging_with_config, LoggingConfig, LoggingError};
pub use self::metrics::{install_prometheus_recorder, register_guard_metrics, MetricsError};

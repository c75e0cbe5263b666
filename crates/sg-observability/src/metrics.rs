//! Metrics registration for SOC Guard.
//!
//! The guard core emits its metrics through the `metrics` facade. This module
//! registers their descriptions and can install a Prometheus recorder whose
//! handle renders the text exposition format.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Number of keys currently held by the rate limiter.
pub const TRACKED_KEYS: &str = "socguard_rate_limiter_tracked_keys";
/// Requests denied by the rate limiter.
pub const DENIED_TOTAL: &str = "socguard_rate_limiter_denied_total";
/// Keys removed by cleanup sweeps.
pub const SWEPT_KEYS_TOTAL: &str = "socguard_rate_limiter_swept_keys_total";
/// Guard rejections, labelled by `reason`.
pub const GUARD_REJECTIONS_TOTAL: &str = "socguard_guard_rejections_total";

/// Every metric name emitted by the guard core.
pub const GUARD_METRICS: [&str; 4] = [
    TRACKED_KEYS,
    DENIED_TOTAL,
    SWEPT_KEYS_TOTAL,
    GUARD_REJECTIONS_TOTAL,
];

/// Errors raised while installing the metrics recorder.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Failed to install Prometheus recorder: {0}")]
    Install(String),
}

/// Registers descriptions for the guard metrics with the current recorder.
pub fn register_guard_metrics() {
    describe_gauge!(TRACKED_KEYS, "Number of keys currently tracked by the rate limiter");
    describe_counter!(DENIED_TOTAL, "Total number of requests denied by the rate limiter");
    describe_counter!(
        SWEPT_KEYS_TOTAL,
        "Total number of idle keys removed by rate limiter cleanup"
    );
    describe_counter!(
        GUARD_REJECTIONS_TOTAL,
        "Total number of guarded operations rejected, by reason"
    );
}

/// Installs a global Prometheus recorder and registers the guard metrics.
///
/// Only one recorder can be installed per process.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    register_guard_metrics();
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in GUARD_METRICS {
            assert!(name.starts_with("socguard_"), "{}", name);
        }
    }

    #[test]
    fn test_register_without_recorder_is_noop() {
        register_guard_metrics();
    }
}

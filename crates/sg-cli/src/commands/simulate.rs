//! Simulate command - replays a request schedule against the rate limiter.

use serde::Serialize;
use sg_core::{rate_limit_key, ActionClass, ManualClock, RateLimitConfig, RateLimiter};
use std::sync::Arc;

/// Simulation parameters from CLI arguments.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Action class being throttled.
    pub class: ActionClass,
    /// Limit applied to the class.
    pub limit: RateLimitConfig,
    /// Offsets of each request from the start, in milliseconds.
    pub offsets_ms: Vec<u64>,
}

/// Outcome of one simulated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationStep {
    pub at_ms: u64,
    pub allowed: bool,
    /// Wait reported after a denial.
    pub wait_ms: u64,
}

/// Runs the schedule on a manual clock for one synthetic user.
///
/// Offsets are replayed in ascending order.
pub fn run_simulation(config: &SimulationConfig) -> Vec<SimulationStep> {
    let clock = ManualClock::new(0);
    let limiter = RateLimiter::with_clock(Arc::new(clock.clone()), config.limit.window_ms);
    let key = rate_limit_key("simulated-user", config.class.as_str());

    let mut offsets = config.offsets_ms.clone();
    offsets.sort_unstable();

    offsets
        .into_iter()
        .map(|at_ms| {
            clock.set(at_ms);
            let allowed = limiter.is_allowed(&key, &config.limit);
            let wait_ms = if allowed {
                0
            } else {
                limiter.get_wait_time(&key, &config.limit)
            };
            tracing::debug!(at_ms, allowed, wait_ms, "Simulated request");
            SimulationStep {
                at_ms,
                allowed,
                wait_ms,
            }
        })
        .collect()
}

/// Parses a comma-separated list of millisecond offsets.
pub fn parse_offsets(input: &str) -> Result<Vec<u64>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| format!("Invalid offset '{}': expected milliseconds", s))
        })
        .collect()
}

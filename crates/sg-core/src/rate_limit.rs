//! Sliding-window rate limiting for guarded operations.
//!
//! Each key (usually built with [`rate_limit_key`]) owns the list of
//! timestamps of the requests that were allowed for it. A request is allowed
//! while fewer than `max_requests` timestamps fall inside the trailing
//! `window_ms`. Expired timestamps are purged lazily on every check, and
//! [`RateLimiter::cleanup`] sweeps idle keys to keep memory bounded.

use crate::clock::{Clock, SystemClock};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Default interval between cleanup sweeps in seconds.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

const ONE_MINUTE_MS: u64 = 60_000;
const FIVE_MINUTES_MS: u64 = 5 * ONE_MINUTE_MS;

/// Limit applied to one class of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Length of the sliding window in milliseconds. Must be > 0.
    pub window_ms: u64,
    /// Requests allowed inside one window. Must be > 0.
    pub max_requests: u32,
}

impl RateLimitConfig {
    /// Creates a new limit.
    pub const fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// Creates a limit of `max_requests` per minute.
    pub const fn per_minute(max_requests: u32) -> Self {
        Self::new(ONE_MINUTE_MS, max_requests)
    }

    /// Returns true if both fields are non-zero.
    pub fn is_valid(&self) -> bool {
        self.window_ms > 0 && self.max_requests > 0
    }
}

/// Classes of throttled actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    /// Saving an integration configuration.
    IntegrationSave,
    /// Running an integration connectivity test.
    IntegrationTest,
    /// Generic backend API call.
    ApiCall,
    /// Creating an incident.
    IncidentCreate,
    /// Updating an incident.
    IncidentUpdate,
    /// Interactive login attempt.
    LoginAttempt,
}

impl ActionClass {
    /// All action classes.
    pub const ALL: [ActionClass; 6] = [
        ActionClass::IntegrationSave,
        ActionClass::IntegrationTest,
        ActionClass::ApiCall,
        ActionClass::IncidentCreate,
        ActionClass::IncidentUpdate,
        ActionClass::LoginAttempt,
    ];

    /// Returns the action name used in rate limit keys and audit entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionClass::IntegrationSave => "integration_save",
            ActionClass::IntegrationTest => "integration_test",
            ActionClass::ApiCall => "api_call",
            ActionClass::IncidentCreate => "create_incident",
            ActionClass::IncidentUpdate => "update_incident",
            ActionClass::LoginAttempt => "login_attempt",
        }
    }
}

impl fmt::Display for ActionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown action class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action class: {0}")]
pub struct ParseActionClassError(pub String);

impl FromStr for ActionClass {
    type Err = ParseActionClassError;

    /// Accepts both the key name (`create_incident`) and the config name
    /// (`incident_create`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "integration_save" => Ok(ActionClass::IntegrationSave),
            "integration_test" => Ok(ActionClass::IntegrationTest),
            "api_call" => Ok(ActionClass::ApiCall),
            "incident_create" | "create_incident" => Ok(ActionClass::IncidentCreate),
            "incident_update" | "update_incident" => Ok(ActionClass::IncidentUpdate),
            "login_attempt" => Ok(ActionClass::LoginAttempt),
            _ => Err(ParseActionClassError(s.to_string())),
        }
    }
}

/// Per-class limit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub integration_save: RateLimitConfig,
    pub integration_test: RateLimitConfig,
    pub api_call: RateLimitConfig,
    pub incident_create: RateLimitConfig,
    pub incident_update: RateLimitConfig,
    pub login_attempt: RateLimitConfig,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            integration_save: RateLimitConfig::per_minute(10),
            integration_test: RateLimitConfig::per_minute(5),
            api_call: RateLimitConfig::per_minute(100),
            incident_create: RateLimitConfig::new(FIVE_MINUTES_MS, 10),
            incident_update: RateLimitConfig::new(FIVE_MINUTES_MS, 10),
            login_attempt: RateLimitConfig::per_minute(5),
        }
    }
}

impl RateLimits {
    /// Returns the limit configured for `class`.
    pub fn for_class(&self, class: ActionClass) -> RateLimitConfig {
        match class {
            ActionClass::IntegrationSave => self.integration_save,
            ActionClass::IntegrationTest => self.integration_test,
            ActionClass::ApiCall => self.api_call,
            ActionClass::IncidentCreate => self.incident_create,
            ActionClass::IncidentUpdate => self.incident_update,
            ActionClass::LoginAttempt => self.login_attempt,
        }
    }

    /// Returns the largest window across all classes.
    ///
    /// Used as the retention age for cleanup sweeps.
    pub fn max_window_ms(&self) -> u64 {
        ActionClass::ALL
            .iter()
            .map(|c| self.for_class(*c).window_ms)
            .max()
            .unwrap_or(ONE_MINUTE_MS)
    }

    /// Returns the first class whose limit has a zero field.
    pub fn first_invalid(&self) -> Option<ActionClass> {
        ActionClass::ALL
            .into_iter()
            .find(|c| !self.for_class(*c).is_valid())
    }
}

/// Builds the rate limit key for a user and action.
pub fn rate_limit_key(user_id: impl fmt::Display, action: &str) -> String {
    format!("rate_limit:{}:{}", user_id, action)
}

/// Process-local sliding-window rate limiter.
///
/// Cloning is cheap and clones share state, so one limiter created at startup
/// can be handed to every service that needs throttling.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Allowed request timestamps per key, oldest first.
    windows: Arc<Mutex<HashMap<String, VecDeque<u64>>>>,
    clock: Arc<dyn Clock>,
    /// Timestamps older than this are dropped by `cleanup`. Never shorter
    /// than the longest window passed to `is_allowed`.
    retention_ms: Arc<AtomicU64>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Creates a limiter on the system clock, retaining entries for the
    /// largest default window.
    pub fn new() -> Self {
        Self::with_clock(
            Arc::new(SystemClock),
            RateLimits::default().max_window_ms(),
        )
    }

    /// Creates a limiter with an explicit clock and retention age.
    pub fn with_clock(clock: Arc<dyn Clock>, retention_ms: u64) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            clock,
            retention_ms: Arc::new(AtomicU64::new(retention_ms)),
        }
    }

    /// Creates a limiter whose retention matches the given limit table.
    pub fn for_limits(clock: Arc<dyn Clock>, limits: &RateLimits) -> Self {
        Self::with_clock(clock, limits.max_window_ms())
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, VecDeque<u64>>> {
        // A panic while holding the lock cannot leave a window half-updated.
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the limiter's current time.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Checks `key` against `config` and records the request if allowed.
    ///
    /// Denied requests are not recorded. The purge, the count and the append
    /// happen under one lock, so concurrent callers can never exceed
    /// `max_requests` per window.
    pub fn is_allowed(&self, key: &str, config: &RateLimitConfig) -> bool {
        let now = self.clock.now_ms();
        let mut windows = self.windows();
        self.retention_ms.fetch_max(config.window_ms, Ordering::Relaxed);

        let timestamps = windows.entry(key.to_owned()).or_default();
        timestamps.retain(|&ts| in_window(ts, now, config.window_ms));

        if timestamps.len() >= config.max_requests as usize {
            counter!("socguard_rate_limiter_denied_total").increment(1);
            tracing::warn!(
                key = %key,
                limit = config.max_requests,
                window_ms = config.window_ms,
                "Rate limit exceeded"
            );
            return false;
        }

        timestamps.push_back(now);
        gauge!("socguard_rate_limiter_tracked_keys").set(windows.len() as f64);
        true
    }

    /// Returns how long the caller must wait before `key` is allowed again.
    ///
    /// Zero when the key is unknown or under its limit. Does not modify state.
    pub fn get_wait_time(&self, key: &str, config: &RateLimitConfig) -> u64 {
        let now = self.clock.now_ms();
        let windows = self.windows();

        let Some(timestamps) = windows.get(key) else {
            return 0;
        };

        let mut live = timestamps
            .iter()
            .copied()
            .filter(|&ts| in_window(ts, now, config.window_ms));
        let Some(first) = live.next() else {
            return 0;
        };
        let (count, oldest) = live.fold((1usize, first), |(n, min), ts| (n + 1, min.min(ts)));

        if count < config.max_requests as usize {
            return 0;
        }

        oldest
            .saturating_add(config.window_ms)
            .saturating_sub(now)
    }

    /// Forgets every request recorded for `key`.
    pub fn reset(&self, key: &str) {
        let mut windows = self.windows();
        windows.remove(key);
        gauge!("socguard_rate_limiter_tracked_keys").set(windows.len() as f64);
    }

    /// Drops timestamps older than the retention age and removes empty keys.
    ///
    /// Returns the number of keys removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_ms();
        let mut windows = self.windows();
        let retention_ms = self.retention_ms();
        let before = windows.len();

        windows.retain(|_, timestamps| {
            timestamps.retain(|&ts| now.saturating_sub(ts) < retention_ms);
            !timestamps.is_empty()
        });

        let removed = before - windows.len();
        gauge!("socguard_rate_limiter_tracked_keys").set(windows.len() as f64);
        counter!("socguard_rate_limiter_swept_keys_total").increment(removed as u64);
        tracing::debug!(
            removed = removed,
            remaining = windows.len(),
            retention_ms = retention_ms,
            "Rate limiter cleanup sweep"
        );
        removed
    }

    /// Returns the current retention age used by `cleanup`.
    pub fn retention_ms(&self) -> u64 {
        self.retention_ms.load(Ordering::Relaxed)
    }

    /// Returns the number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows().len()
    }

    /// Returns the number of timestamps stored for `key`, expired ones included.
    pub fn recorded_requests(&self, key: &str) -> usize {
        self.windows().get(key).map_or(0, VecDeque::len)
    }
}

fn in_window(ts: u64, now: u64, window_ms: u64) -> bool {
    ts.saturating_add(window_ms) > now
}

/// Runs [`RateLimiter::cleanup`] every `interval` on the current tokio runtime.
///
/// The first sweep runs immediately. Abort the returned handle to stop it.
pub fn spawn_cleanup_task(limiter: RateLimiter, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            limiter.cleanup();
        }
    })
}

//! Guard configuration loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file) yields the
//! standard limits:
//!
//! ```yaml
//! rate_limits:
//!   integration_save: { window_ms: 60000, max_requests: 10 }
//!   incident_create:  { window_ms: 300000, max_requests: 10 }
//! cleanup_interval_secs: 60
//! ```

use crate::clock::Clock;
use crate::guard::AccessGuard;
use crate::rate_limit::{RateLimiter, RateLimits, DEFAULT_CLEANUP_INTERVAL_SECS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Overrides `cleanup_interval_secs`.
pub const CLEANUP_INTERVAL_ENV: &str = "SOCGUARD_CLEANUP_INTERVAL_SECS";

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Rate limits and cleanup schedule for the access guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Limit per action class.
    pub rate_limits: RateLimits,
    /// Seconds between limiter cleanup sweeps.
    pub cleanup_interval_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            rate_limits: RateLimits::default(),
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl GuardConfig {
    /// Loads, applies environment overrides and validates a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `path` if given, otherwise starts from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Self::default();
                config.apply_overrides(|name| std::env::var(name).ok())?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Parses YAML without overrides or validation.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment overrides, reading variables through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(CLEANUP_INTERVAL_ENV) {
            self.cleanup_interval_secs = value.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    CLEANUP_INTERVAL_ENV, value
                ))
            })?;
        }
        Ok(())
    }

    /// Rejects zero windows, zero limits and a zero cleanup interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(class) = self.rate_limits.first_invalid() {
            return Err(ConfigError::InvalidValue(format!(
                "rate limit '{}' must have a non-zero window and request count",
                class
            )));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "cleanup_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Interval between cleanup sweeps.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Builds an access guard on `clock` with these limits.
    pub fn build_guard(&self, clock: Arc<dyn Clock>) -> AccessGuard {
        let limiter = RateLimiter::for_limits(clock, &self.rate_limits);
        AccessGuard::new(limiter, self.rate_limits.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{ActionClass, RateLimitConfig};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(GuardConfig::from_yaml_str("").unwrap(), GuardConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
rate_limits:
  login_attempt:
    window_ms: 900000
    max_requests: 3
"#;
        let config = GuardConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.rate_limits.for_class(ActionClass::LoginAttempt),
            RateLimitConfig::new(900_000, 3)
        );
        assert_eq!(
            config.rate_limits.integration_save,
            RateLimits::default().integration_save
        );
        assert_eq!(config.cleanup_interval_secs, DEFAULT_CLEANUP_INTERVAL_SECS);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cleanup_interval_secs: 15").unwrap();

        let config = GuardConfig::load(file.path()).unwrap();
        assert_eq!(config.cleanup_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "rate_limits:\n  api_call:\n    window_ms: 60000\n    max_requests: 0"
        )
        .unwrap();

        let err = GuardConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref m) if m.contains("api_call")));
    }

    #[test]
    fn test_missing_file_and_bad_yaml() {
        assert!(matches!(
            GuardConfig::load(Path::new("/nonexistent/socguard.yaml")),
            Err(ConfigError::IoError(_))
        ));
        assert!(matches!(
            GuardConfig::from_yaml_str("rate_limits: [1, 2"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_env_override() {
        let mut config = GuardConfig::default();
        config
            .apply_overrides(|name| (name == CLEANUP_INTERVAL_ENV).then(|| "5".to_string()))
            .unwrap();
        assert_eq!(config.cleanup_interval_secs, 5);

        let err = config
            .apply_overrides(|_| Some("soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        config.cleanup_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}

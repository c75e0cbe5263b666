//! # sg-core
//!
//! Access guard core for SOC Guard.
//!
//! This crate provides the sliding-window rate limiter, the role capability
//! table, payload validation and sanitization, API key encryption, and the
//! guarded integration/incident services that tie them together.

pub mod auth;
pub mod backend;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod guard;
pub mod incident;
pub mod integration;
pub mod rate_limit;
pub mod service;
pub mod validation;

pub use auth::{is_action_permitted, is_profile_permitted, PermissionAction, Role, UserProfile};
pub use backend::{AuditLogEntry, Backend, BackendError, MockBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, GuardConfig};
pub use crypto::{cipher_from_env, generate_key, AeadApiKeyCipher, ApiKeyCipher, CryptoError};
pub use guard::{AccessGuard, GuardError};
pub use incident::{Incident, IncidentFilter, IncidentStatus, IncidentUpdate, NewIncident, Severity};
pub use integration::{IntegrationConfig, IntegrationKind, IntegrationType, StoredIntegration};
pub use rate_limit::{
    rate_limit_key, spawn_cleanup_task, ActionClass, ParseActionClassError, RateLimitConfig,
    RateLimiter, RateLimits,
};
pub use service::{IncidentService, IntegrationService, ServiceError};

// Validation exports
pub use validation::{
    is_valid_uuid, sanitize_json, validate_incident_fields, validate_integration_payload,
    InputSanitizer, ValidationError,
};

//! Pre-flight checks for mutating operations.
//!
//! [`AccessGuard`] runs the checks every guarded call must pass before
//! it may reach the backend, in this order:
//!
//! 1. a user is signed in
//! 2. payload validation
//! 3. account-active flag and role permission
//! 4. per-user rate limit for the action class
//!
//! Each rejection is a [`GuardError`] naming the check that failed, so the
//! caller can tell the user which guard stopped the action.

use crate::auth::{is_action_permitted, PermissionAction, Role, UserProfile};
use crate::incident::{IncidentUpdate, NewIncident};
use crate::integration::{IntegrationConfig, IntegrationKind, IntegrationType};
use crate::rate_limit::{rate_limit_key, ActionClass, RateLimiter, RateLimits};
use crate::validation::{
    check_incident_update, check_integration_payload, validate_incident_fields,
    validate_integration_payload, validate_new_incident, ValidationError,
};
use metrics::counter;
use thiserror::Error;
use uuid::Uuid;

/// Reasons a guarded operation was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// No signed-in user.
    #[error("Authentication required")]
    NotAuthenticated,

    /// The signed-in account is deactivated.
    #[error("Account is inactive")]
    AccountInactive,

    /// The role lacks the capability.
    #[error("Insufficient permissions: role '{role}' cannot {action}")]
    PermissionDenied {
        role: Role,
        action: PermissionAction,
    },

    /// The payload failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Too many requests of this class in the current window.
    #[error("Rate limit exceeded for {class}; retry in {wait_ms} ms")]
    RateLimited { class: ActionClass, wait_ms: u64 },
}

impl GuardError {
    /// Short name of the check that rejected the call.
    pub fn kind(&self) -> &'static str {
        match self {
            GuardError::NotAuthenticated => "authentication",
            GuardError::AccountInactive | GuardError::PermissionDenied { .. } => "permission",
            GuardError::Validation(_) => "validation",
            GuardError::RateLimited { .. } => "rate_limit",
        }
    }

    /// Seconds to wait before retrying, rounded up and at least one. Only set
    /// for rate limits.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GuardError::RateLimited { wait_ms, .. } => Some(wait_ms.div_ceil(1000).max(1)),
            _ => None,
        }
    }

    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            GuardError::NotAuthenticated => "Please sign in to continue.".to_string(),
            GuardError::AccountInactive => {
                "Your account is inactive. Contact an administrator.".to_string()
            }
            GuardError::PermissionDenied { action, .. } => {
                format!("You do not have permission to {} this resource.", action)
            }
            GuardError::Validation(e) => format!("Invalid input: {}.", e),
            GuardError::RateLimited { .. } => format!(
                "Too many requests. Please try again in {} seconds.",
                self.retry_after_secs().unwrap_or(1)
            ),
        }
    }
}

/// Permission, validation and throttling decisions for guarded operations.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    limiter: RateLimiter,
    limits: RateLimits,
}

impl AccessGuard {
    /// Creates a guard over a shared limiter and limit table.
    pub fn new(limiter: RateLimiter, limits: RateLimits) -> Self {
        Self { limiter, limits }
    }

    /// Returns the underlying rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Returns the configured limits.
    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    /// See [`crate::auth::is_action_permitted`].
    pub fn is_action_permitted(&self, role: Role, action: PermissionAction) -> bool {
        is_action_permitted(role, action)
    }

    /// See [`crate::validation::validate_integration_payload`].
    pub fn validate_integration_payload(
        &self,
        kind: IntegrationKind,
        payload: &IntegrationConfig,
    ) -> bool {
        validate_integration_payload(kind, payload)
    }

    /// See [`crate::validation::validate_incident_fields`].
    pub fn validate_incident_fields(&self, title: &str, severity: &str) -> bool {
        validate_incident_fields(title, severity)
    }

    /// Checks that a user is signed in, active, and allowed to perform `action`.
    pub fn require_permission<'a>(
        &self,
        profile: Option<&'a UserProfile>,
        action: PermissionAction,
    ) -> Result<&'a UserProfile, GuardError> {
        let profile = profile.ok_or(GuardError::NotAuthenticated)?;

        if !profile.is_active {
            return Err(reject(GuardError::AccountInactive, profile.id));
        }

        if !is_action_permitted(profile.role, action) {
            return Err(reject(
                GuardError::PermissionDenied {
                    role: profile.role,
                    action,
                },
                profile.id,
            ));
        }

        Ok(profile)
    }

    /// Records one `class` request for `user_id`, or rejects it with the wait time.
    pub fn throttle(&self, user_id: Uuid, class: ActionClass) -> Result<(), GuardError> {
        let key = rate_limit_key(user_id, class.as_str());
        let config = self.limits.for_class(class);

        if self.limiter.is_allowed(&key, &config) {
            return Ok(());
        }

        let wait_ms = self.limiter.get_wait_time(&key, &config);
        Err(reject(GuardError::RateLimited { class, wait_ms }, user_id))
    }

    /// Runs the permission check and, when `class` is set, the rate limit.
    pub fn authorize<'a>(
        &self,
        profile: Option<&'a UserProfile>,
        action: PermissionAction,
        class: Option<ActionClass>,
    ) -> Result<&'a UserProfile, GuardError> {
        let profile = self.require_permission(profile, action)?;
        if let Some(class) = class {
            self.throttle(profile.id, class)?;
        }
        Ok(profile)
    }

    /// Guards saving an integration configuration.
    pub fn check_integration_save<'a>(
        &self,
        profile: Option<&'a UserProfile>,
        integration: IntegrationType,
        payload: &IntegrationConfig,
    ) -> Result<&'a UserProfile, GuardError> {
        self.checked(
            profile,
            check_integration_payload(integration.kind(), payload),
            PermissionAction::Update,
            ActionClass::IntegrationSave,
        )
    }

    /// Guards creating an incident.
    pub fn check_incident_create<'a>(
        &self,
        profile: Option<&'a UserProfile>,
        draft: &NewIncident,
    ) -> Result<&'a UserProfile, GuardError> {
        self.checked(
            profile,
            validate_new_incident(draft),
            PermissionAction::Create,
            ActionClass::IncidentCreate,
        )
    }

    /// Guards updating an incident.
    pub fn check_incident_update<'a>(
        &self,
        profile: Option<&'a UserProfile>,
        update: &IncidentUpdate,
    ) -> Result<&'a UserProfile, GuardError> {
        self.checked(
            profile,
            check_incident_update(update),
            PermissionAction::Update,
            ActionClass::IncidentUpdate,
        )
    }

    fn checked<'a>(
        &self,
        profile: Option<&'a UserProfile>,
        validation: Result<(), ValidationError>,
        action: PermissionAction,
        class: ActionClass,
    ) -> Result<&'a UserProfile, GuardError> {
        let user = profile.ok_or(GuardError::NotAuthenticated)?;
        if let Err(e) = validation {
            return Err(reject(GuardError::Validation(e), user.id));
        }
        self.authorize(profile, action, Some(class))
    }
}

fn reject(error: GuardError, user_id: Uuid) -> GuardError {
    counter!("socguard_guard_rejections_total", "reason" => error.kind()).increment(1);
    tracing::warn!(user_id = %user_id, reason = error.kind(), "{}", error);
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::incident::Severity;
    use crate::rate_limit::RateLimitConfig;
    use std::sync::Arc;

    fn guard_with(limits: RateLimits) -> (AccessGuard, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let limiter = RateLimiter::for_limits(Arc::new(clock.clone()), &limits);
        (AccessGuard::new(limiter, limits), clock)
    }

    fn guard() -> AccessGuard {
        guard_with(RateLimits::default()).0
    }

    #[test]
    fn test_require_permission() {
        let guard = guard();
        let analyst = UserProfile::new(Role::Analyst);

        assert_eq!(
            guard.require_permission(None, PermissionAction::Read),
            Err(GuardError::NotAuthenticated)
        );
        assert!(guard
            .require_permission(Some(&analyst), PermissionAction::Update)
            .is_ok());
        assert_eq!(
            guard.require_permission(Some(&analyst), PermissionAction::Delete),
            Err(GuardError::PermissionDenied {
                role: Role::Analyst,
                action: PermissionAction::Delete
            })
        );

        let inactive_admin = UserProfile::new(Role::Admin).deactivated();
        assert_eq!(
            guard.require_permission(Some(&inactive_admin), PermissionAction::Read),
            Err(GuardError::AccountInactive)
        );
    }

    #[test]
    fn test_integration_save_order_of_checks() {
        let guard = guard();
        let viewer = UserProfile::new(Role::Viewer);

        // Validation is reported before permission
        let err = guard
            .check_integration_save(
                Some(&viewer),
                IntegrationType::Slack,
                &IntegrationConfig::with_webhook("ftp://x"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = guard
            .check_integration_save(
                Some(&viewer),
                IntegrationType::Slack,
                &IntegrationConfig::with_webhook("https://hooks.slack.com/services/T0/B0/x"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "permission");

        // Nobody signed in wins over an invalid payload
        let err = guard
            .check_integration_save(None, IntegrationType::Slack, &IntegrationConfig::default())
            .unwrap_err();
        assert_eq!(err, GuardError::NotAuthenticated);
    }

    #[test]
    fn test_integration_save_rate_limited() {
        let limits = RateLimits {
            integration_save: RateLimitConfig::new(60_000, 2),
            ..RateLimits::default()
        };
        let (guard, clock) = guard_with(limits);
        let admin = UserProfile::new(Role::Admin);
        let payload = IntegrationConfig::with_api_key("vt-key");

        for _ in 0..2 {
            assert!(guard
                .check_integration_save(Some(&admin), IntegrationType::VirusTotal, &payload)
                .is_ok());
        }

        clock.advance(1_500);
        let err = guard
            .check_integration_save(Some(&admin), IntegrationType::VirusTotal, &payload)
            .unwrap_err();
        assert_eq!(
            err,
            GuardError::RateLimited {
                class: ActionClass::IntegrationSave,
                wait_ms: 58_500
            }
        );
        assert_eq!(err.retry_after_secs(), Some(59));
        assert_eq!(
            err.user_message(),
            "Too many requests. Please try again in 59 seconds."
        );
    }

    #[test]
    fn test_rejected_calls_do_not_consume_quota() {
        let limits = RateLimits {
            incident_create: RateLimitConfig::new(60_000, 1),
            ..RateLimits::default()
        };
        let (guard, _clock) = guard_with(limits);
        let analyst = UserProfile::new(Role::Analyst);

        let invalid = NewIncident::new("  ", Severity::High);
        assert!(guard.check_incident_create(Some(&analyst), &invalid).is_err());

        let valid = NewIncident::new("Ransomware note found", Severity::Critical);
        assert!(guard.check_incident_create(Some(&analyst), &valid).is_ok());
    }

    #[test]
    fn test_throttle_is_per_user() {
        let limits = RateLimits {
            incident_update: RateLimitConfig::new(60_000, 1),
            ..RateLimits::default()
        };
        let (guard, _clock) = guard_with(limits);
        let a = UserProfile::new(Role::Analyst);
        let b = UserProfile::new(Role::Analyst);
        let update = IncidentUpdate::default();

        assert!(guard.check_incident_update(Some(&a), &update).is_ok());
        assert!(guard.check_incident_update(Some(&a), &update).is_err());
        assert!(guard.check_incident_update(Some(&b), &update).is_ok());
    }

    #[test]
    fn test_delegating_checks() {
        let guard = guard();
        assert!(!guard.is_action_permitted(Role::Viewer, PermissionAction::Create));
        assert!(guard.validate_incident_fields("Title", "critical"));
        assert!(guard.validate_integration_payload(
            IntegrationKind::WEBHOOK,
            &IntegrationConfig::with_webhook("https://x.com/hook")
        ));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            GuardError::PermissionDenied {
                role: Role::Viewer,
                action: PermissionAction::Delete
            }
            .user_message(),
            "You do not have permission to delete this resource."
        );
        assert_eq!(
            GuardError::Validation(ValidationError::EmptyTitle).user_message(),
            "Invalid input: title is required."
        );
        assert_eq!(GuardError::NotAuthenticated.retry_after_secs(), None);
    }

    #[test]
    fn test_zero_wait_still_asks_for_a_second() {
        let err = GuardError::RateLimited {
            class: ActionClass::ApiCall,
            wait_ms: 0,
        };
        assert_eq!(err.retry_after_secs(), Some(1));
        assert_eq!(
            err.user_message(),
            "Too many requests. Please try again in 1 seconds."
        );
    }
}

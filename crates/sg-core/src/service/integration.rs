//! Integration configuration service.

use super::{record_audit, ServiceError};
use crate::auth::{PermissionAction, UserProfile};
use crate::backend::{AuditLogEntry, Backend};
use crate::crypto::ApiKeyCipher;
use crate::guard::AccessGuard;
use crate::integration::{IntegrationConfig, IntegrationType, StoredIntegration};
use crate::rate_limit::ActionClass;
use crate::validation::check_integration_payload;
use serde_json::json;
use std::sync::Arc;

/// Saves, loads and tests third-party integration configs.
///
/// API keys are sealed with the configured [`ApiKeyCipher`] before they are
/// written and opened again on read.
pub struct IntegrationService {
    backend: Arc<dyn Backend>,
    guard: AccessGuard,
    cipher: Arc<dyn ApiKeyCipher>,
}

impl IntegrationService {
    pub fn new(
        backend: Arc<dyn Backend>,
        guard: AccessGuard,
        cipher: Arc<dyn ApiKeyCipher>,
    ) -> Self {
        Self {
            backend,
            guard,
            cipher,
        }
    }

    /// Validates, authorizes and stores `config` for the signed-in user.
    ///
    /// The returned record holds the sealed key, never the plaintext.
    pub async fn save_config(
        &self,
        integration_type: IntegrationType,
        config: IntegrationConfig,
    ) -> Result<StoredIntegration, ServiceError> {
        let user = self.backend.current_user().await?;
        let user = self
            .guard
            .check_integration_save(user.as_ref(), integration_type, &config)?;

        let api_key = config
            .api_key
            .as_deref()
            .map(|key| self.cipher.seal(integration_type, key.trim()))
            .transpose()?;
        let sealed = IntegrationConfig {
            api_key,
            webhook_url: config.webhook_url.map(|url| url.trim().to_string()),
            ..config
        };

        let stored = self
            .backend
            .upsert_integration_config(user.id, integration_type, &sealed)
            .await?;

        tracing::info!(
            user_id = %user.id,
            integration = integration_type.as_db_str(),
            enabled = stored.is_enabled(),
            "Integration configured"
        );

        record_audit(
            self.backend.as_ref(),
            AuditLogEntry::new(
                user.id,
                "integration_configured",
                "integration",
                Some(integration_type.as_db_str().to_string()),
                json!({ "enabled": stored.is_enabled() }),
            ),
        )
        .await;

        Ok(stored)
    }

    /// Returns every integration's config for the signed-in user, with API
    /// keys decrypted.
    ///
    /// Integrations that were never saved are reported as disabled and empty.
    pub async fn get_configs(
        &self,
    ) -> Result<Vec<(IntegrationType, IntegrationConfig)>, ServiceError> {
        let user = self.reader().await?;
        let stored = self.backend.list_integration_configs(user.id).await?;

        Ok(IntegrationType::ALL
            .into_iter()
            .map(|integration_type| {
                let config = stored
                    .iter()
                    .find(|s| s.integration_type == integration_type)
                    .map(|s| self.open(&user, s))
                    .unwrap_or_default();
                (integration_type, config)
            })
            .collect())
    }

    /// Returns one integration's config, decrypted.
    pub async fn get_config(
        &self,
        integration_type: IntegrationType,
    ) -> Result<IntegrationConfig, ServiceError> {
        let user = self.reader().await?;
        let stored = self.backend.list_integration_configs(user.id).await?;

        Ok(stored
            .iter()
            .find(|s| s.integration_type == integration_type)
            .map(|s| self.open(&user, s))
            .unwrap_or_default())
    }

    /// Checks that the stored config for `integration_type` is usable.
    ///
    /// Throttled separately from saves. Nothing is sent to the third party.
    pub async fn test_integration(
        &self,
        integration_type: IntegrationType,
    ) -> Result<(), ServiceError> {
        let user = self.backend.current_user().await?;
        let user = self.guard.authorize(
            user.as_ref(),
            PermissionAction::Read,
            Some(ActionClass::IntegrationTest),
        )?;

        let stored = self.backend.list_integration_configs(user.id).await?;
        let config = stored
            .iter()
            .find(|s| s.integration_type == integration_type)
            .map(|s| self.open(user, s))
            .unwrap_or_default();
        check_integration_payload(integration_type.kind(), &config)?;

        record_audit(
            self.backend.as_ref(),
            AuditLogEntry::new(
                user.id,
                "integration_tested",
                "integration",
                Some(integration_type.as_db_str().to_string()),
                json!({ "enabled": config.enabled }),
            ),
        )
        .await;

        Ok(())
    }

    async fn reader(&self) -> Result<UserProfile, ServiceError> {
        let user = self.backend.current_user().await?;
        let user = self
            .guard
            .require_permission(user.as_ref(), PermissionAction::Read)?;
        Ok(user.clone())
    }

    /// Decrypts a stored record. A key that fails to open is dropped.
    fn open(&self, user: &UserProfile, stored: &StoredIntegration) -> IntegrationConfig {
        let api_key = match stored.config.api_key.as_deref() {
            Some(sealed) => match self.cipher.open(stored.integration_type, sealed) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::error!(
                        user_id = %user.id,
                        integration = stored.integration_type.as_db_str(),
                        error = %e,
                        "Failed to decrypt stored API key"
                    );
                    None
                }
            },
            None => None,
        };

        IntegrationConfig {
            api_key,
            ..stored.config.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::backend::MockBackend;
    use crate::crypto::AeadApiKeyCipher;
    use crate::guard::GuardError;
    use crate::rate_limit::{RateLimiter, RateLimits};
    use crate::validation::ValidationError;

    fn service(backend: &MockBackend) -> IntegrationService {
        IntegrationService::new(
            Arc::new(backend.clone()),
            AccessGuard::new(RateLimiter::new(), RateLimits::default()),
            Arc::new(AeadApiKeyCipher::new(&[3u8; 32])),
        )
    }

    #[tokio::test]
    async fn test_save_encrypts_and_get_decrypts() {
        let admin = UserProfile::new(Role::Admin);
        let backend = MockBackend::with_user(admin.clone());
        let service = service(&backend);

        service
            .save_config(
                IntegrationType::VirusTotal,
                IntegrationConfig::with_api_key("vt-secret-key"),
            )
            .await
            .unwrap();

        let raw = backend
            .stored_integration(admin.id, IntegrationType::VirusTotal)
            .await
            .unwrap();
        assert_ne!(raw.config.api_key.as_deref(), Some("vt-secret-key"));

        let config = service.get_config(IntegrationType::VirusTotal).await.unwrap();
        assert_eq!(config.api_key.as_deref(), Some("vt-secret-key"));
        assert!(config.enabled);
    }

    #[tokio::test]
    async fn test_missing_configs_are_disabled() {
        let backend = MockBackend::with_user(UserProfile::new(Role::Viewer));
        let service = service(&backend);

        let configs = service.get_configs().await.unwrap();
        assert_eq!(configs.len(), IntegrationType::ALL.len());
        assert!(configs.iter().all(|(_, c)| !c.enabled && c.api_key.is_none()));
    }

    #[tokio::test]
    async fn test_viewer_cannot_save() {
        let backend = MockBackend::with_user(UserProfile::new(Role::Viewer));
        let service = service(&backend);

        let err = service
            .save_config(
                IntegrationType::Slack,
                IntegrationConfig::with_webhook("https://hooks.slack.com/services/T/B/x"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_guard(),
            Some(GuardError::PermissionDenied { .. })
        ));
        assert!(backend.audit_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_audit_records_only_enabled_flag() {
        let backend = MockBackend::with_user(UserProfile::new(Role::Analyst));
        let service = service(&backend);

        service
            .save_config(
                IntegrationType::CloudWatch,
                IntegrationConfig::with_api_key("AKIA-secret"),
            )
            .await
            .unwrap();

        let entries = backend.audit_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "integration_configured");
        assert_eq!(entries[0].details, json!({ "enabled": true }));
        assert!(!entries[0].details.to_string().contains("AKIA"));
    }

    #[tokio::test]
    async fn test_integration_requires_stored_config() {
        let backend = MockBackend::with_user(UserProfile::new(Role::Analyst));
        let service = service(&backend);

        let err = service
            .test_integration(IntegrationType::Slack)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_guard(),
            Some(GuardError::Validation(ValidationError::MissingWebhookUrl))
        ));

        service
            .save_config(
                IntegrationType::Slack,
                IntegrationConfig::with_webhook("https://hooks.slack.com/services/T/B/x"),
            )
            .await
            .unwrap();
        service.test_integration(IntegrationType::Slack).await.unwrap();

        let actions: Vec<String> = backend
            .audit_entries()
            .await
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["integration_configured", "integration_tested"]);
    }

    #[tokio::test]
    async fn test_unauthenticated() {
        let backend = MockBackend::new();
        let service = service(&backend);

        let err = service.get_configs().await.unwrap_err();
        assert!(matches!(err.as_guard(), Some(GuardError::NotAuthenticated)));
    }
}

//! In-memory implementation of [`Backend`].

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuditLogEntry, Backend, BackendError};
use crate::auth::UserProfile;
use crate::incident::{Incident, IncidentFilter, IncidentUpdate};
use crate::integration::{IntegrationConfig, IntegrationType, StoredIntegration};

/// Backend holding everything in memory.
///
/// Clones share state, so a test can keep a handle for assertions while a
/// service owns another.
#[derive(Clone, Default)]
pub struct MockBackend {
    user: Arc<RwLock<Option<UserProfile>>>,
    integrations: Arc<RwLock<HashMap<(Uuid, IntegrationType), StoredIntegration>>>,
    incidents: Arc<RwLock<HashMap<Uuid, Incident>>>,
    audit_log: Arc<RwLock<Vec<AuditLogEntry>>>,
    fail_audit: Arc<AtomicBool>,
}

impl MockBackend {
    /// Creates an empty backend with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with `user` signed in.
    pub fn with_user(user: UserProfile) -> Self {
        Self {
            user: Arc::new(RwLock::new(Some(user))),
            ..Self::default()
        }
    }

    /// Signs `user` in, or signs out with `None`.
    pub async fn set_user(&self, user: Option<UserProfile>) {
        *self.user.write().await = user;
    }

    /// Makes every subsequent audit write fail.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Returns a copy of the audit log, oldest first.
    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit_log.read().await.clone()
    }

    /// Returns the raw stored integration record.
    pub async fn stored_integration(
        &self,
        user_id: Uuid,
        integration_type: IntegrationType,
    ) -> Option<StoredIntegration> {
        self.integrations
            .read()
            .await
            .get(&(user_id, integration_type))
            .cloned()
    }

    /// Gets a snapshot of all incidents.
    pub async fn snapshot(&self) -> Vec<Incident> {
        self.incidents.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn current_user(&self) -> Result<Option<UserProfile>, BackendError> {
        Ok(self.user.read().await.clone())
    }

    async fn upsert_integration_config(
        &self,
        user_id: Uuid,
        integration_type: IntegrationType,
        config: &IntegrationConfig,
    ) -> Result<StoredIntegration, BackendError> {
        let mut integrations = self.integrations.write().await;

        let stored = match integrations.get_mut(&(user_id, integration_type)) {
            Some(existing) => {
                existing.config = config.clone();
                existing.updated_at = Utc::now();
                existing.clone()
            }
            None => {
                let stored = StoredIntegration::new(user_id, integration_type, config.clone());
                integrations.insert((user_id, integration_type), stored.clone());
                stored
            }
        };

        Ok(stored)
    }

    async fn list_integration_configs(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<StoredIntegration>, BackendError> {
        let integrations = self.integrations.read().await;
        Ok(integrations
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_incident(&self, incident: &Incident) -> Result<Incident, BackendError> {
        let mut incidents = self.incidents.write().await;

        if incidents.contains_key(&incident.id) {
            return Err(BackendError::Constraint(format!(
                "Incident with id '{}' already exists",
                incident.id
            )));
        }

        incidents.insert(incident.id, incident.clone());
        Ok(incident.clone())
    }

    async fn update_incident(
        &self,
        id: Uuid,
        update: &IncidentUpdate,
    ) -> Result<Incident, BackendError> {
        let mut incidents = self.incidents.write().await;
        let incident = incidents
            .get_mut(&id)
            .ok_or_else(|| BackendError::incident_not_found(id))?;
        incident.apply_update(update);
        Ok(incident.clone())
    }

    async fn delete_incident(&self, id: Uuid) -> Result<bool, BackendError> {
        Ok(self.incidents.write().await.remove(&id).is_some())
    }

    async fn list_incidents(
        &self,
        filter: &IncidentFilter,
    ) -> Result<Vec<Incident>, BackendError> {
        let incidents = self.incidents.read().await;
        Ok(filter.apply(incidents.values().cloned().collect()))
    }

    async fn get_incident(&self, id: Uuid) -> Result<Option<Incident>, BackendError> {
        Ok(self.incidents.read().await.get(&id).cloned())
    }

    async fn insert_audit_log_entry(&self, entry: &AuditLogEntry) -> Result<(), BackendError> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("audit log offline".to_string()));
        }
        self.audit_log.write().await.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::incident::{IncidentStatus, NewIncident, Severity};

    #[tokio::test]
    async fn test_current_user() {
        let backend = MockBackend::new();
        assert!(backend.current_user().await.unwrap().is_none());

        let analyst = UserProfile::new(Role::Analyst);
        backend.set_user(Some(analyst.clone())).await;
        assert_eq!(backend.current_user().await.unwrap(), Some(analyst));
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_config() {
        let backend = MockBackend::new();
        let user = Uuid::new_v4();

        let first = backend
            .upsert_integration_config(
                user,
                IntegrationType::Slack,
                &IntegrationConfig::with_webhook("https://a.example"),
            )
            .await
            .unwrap();
        let second = backend
            .upsert_integration_config(
                user,
                IntegrationType::Slack,
                &IntegrationConfig::with_webhook("https://b.example"),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let listed = backend.list_integration_configs(user).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].config.webhook_url.as_deref(), Some("https://b.example"));

        assert!(backend
            .list_integration_configs(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_incident_crud() {
        let backend = MockBackend::new();
        let incident = Incident::from_new(
            NewIncident::new("Beaconing host", Severity::High),
            Uuid::new_v4(),
        );

        backend.insert_incident(&incident).await.unwrap();
        assert!(matches!(
            backend.insert_incident(&incident).await,
            Err(BackendError::Constraint(_))
        ));

        let updated = backend
            .update_incident(
                incident.id,
                &IncidentUpdate {
                    status: Some(IncidentStatus::UnderInvestigation),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, IncidentStatus::UnderInvestigation);

        assert!(backend.delete_incident(incident.id).await.unwrap());
        assert!(!backend.delete_incident(incident.id).await.unwrap());
        assert!(backend.get_incident(incident.id).await.unwrap().is_none());
        assert_eq!(
            backend
                .update_incident(incident.id, &IncidentUpdate::default())
                .await,
            Err(BackendError::incident_not_found(incident.id))
        );
    }

    #[tokio::test]
    async fn test_audit_failure_toggle() {
        let backend = MockBackend::new();
        let entry = AuditLogEntry::new(
            Uuid::new_v4(),
            "delete_incident",
            "incident",
            None,
            serde_json::json!({}),
        );

        backend.fail_audit_writes(true);
        assert!(backend.insert_audit_log_entry(&entry).await.is_err());

        backend.fail_audit_writes(false);
        backend.insert_audit_log_entry(&entry).await.unwrap();
        assert_eq!(backend.audit_entries().await.len(), 1);
    }
}

//! Persistence seam for guarded services.
//!
//! The [`Backend`] trait covers the calls the dashboard makes against its
//! hosted database: the signed-in user's profile, integration configs,
//! incidents and the audit log. Services only ever talk to this trait, so the
//! in-memory [`MockBackend`] can stand in for the real store.

mod mock;

pub use mock::MockBackend;

use crate::auth::UserProfile;
use crate::incident::{Incident, IncidentFilter, IncidentUpdate};
use crate::integration::{IntegrationConfig, IntegrationType, StoredIntegration};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during backend operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Record not found.
    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Constraint violation (e.g., duplicate id).
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The query itself failed.
    #[error("Query error: {0}")]
    Query(String),
}

impl BackendError {
    /// Shorthand for a missing incident.
    pub fn incident_not_found(id: Uuid) -> Self {
        BackendError::NotFound {
            entity: "incident".to_string(),
            id: id.to_string(),
        }
    }
}

/// One row of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// Acting user.
    pub user_id: Uuid,
    /// What happened, e.g. `create_incident`.
    pub action: String,
    /// Kind of resource touched, e.g. `incident`.
    pub resource_type: String,
    /// Identifier of the resource, when there is one.
    pub resource_id: Option<String>,
    /// Sanitized details of the change.
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Creates an entry timestamped now.
    pub fn new(
        user_id: Uuid,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id,
            details,
            created_at: Utc::now(),
        }
    }
}

/// Storage operations used by the guarded services.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the signed-in user, or `None` when nobody is signed in.
    async fn current_user(&self) -> Result<Option<UserProfile>, BackendError>;

    /// Inserts or replaces the config for `(user_id, integration_type)`.
    async fn upsert_integration_config(
        &self,
        user_id: Uuid,
        integration_type: IntegrationType,
        config: &IntegrationConfig,
    ) -> Result<StoredIntegration, BackendError>;

    /// Lists every integration config owned by `user_id`.
    async fn list_integration_configs(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<StoredIntegration>, BackendError>;

    /// Stores a new incident.
    async fn insert_incident(&self, incident: &Incident) -> Result<Incident, BackendError>;

    /// Applies `update` to an existing incident.
    async fn update_incident(
        &self,
        id: Uuid,
        update: &IncidentUpdate,
    ) -> Result<Incident, BackendError>;

    /// Deletes an incident. Returns false if it did not exist.
    async fn delete_incident(&self, id: Uuid) -> Result<bool, BackendError>;

    /// Lists incidents matching `filter`, newest first.
    async fn list_incidents(&self, filter: &IncidentFilter)
        -> Result<Vec<Incident>, BackendError>;

    /// Gets an incident by id.
    async fn get_incident(&self, id: Uuid) -> Result<Option<Incident>, BackendError>;

    /// Appends an audit log entry.
    async fn insert_audit_log_entry(&self, entry: &AuditLogEntry) -> Result<(), BackendError>;
}

//! Incident service.

use super::{record_audit, ServiceError};
use crate::auth::{PermissionAction, UserProfile};
use crate::backend::{AuditLogEntry, Backend, BackendError};
use crate::guard::AccessGuard;
use crate::incident::{Incident, IncidentFilter, IncidentUpdate, NewIncident};
use crate::validation::{is_valid_uuid, InputSanitizer, ValidationError};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Creates, lists, updates and deletes incidents on behalf of the signed-in user.
pub struct IncidentService {
    backend: Arc<dyn Backend>,
    guard: AccessGuard,
    sanitizer: InputSanitizer,
}

impl IncidentService {
    pub fn new(backend: Arc<dyn Backend>, guard: AccessGuard) -> Self {
        Self {
            backend,
            guard,
            sanitizer: InputSanitizer::new(),
        }
    }

    /// Validates, sanitizes and stores a new incident.
    pub async fn create(&self, draft: NewIncident) -> Result<Incident, ServiceError> {
        let user = self.backend.current_user().await?;
        let user = self.guard.check_incident_create(user.as_ref(), &draft)?;

        let draft = NewIncident {
            title: self.sanitizer.sanitize(&draft.title),
            description: draft.description.map(|d| self.sanitizer.sanitize(&d)),
            location_data: draft.location_data.map(|v| self.sanitizer.sanitize_json(&v)),
            playbook_data: draft.playbook_data.map(|v| self.sanitizer.sanitize_json(&v)),
            ..draft
        };

        let incident = self
            .backend
            .insert_incident(&Incident::from_new(draft, user.id))
            .await?;

        tracing::info!(
            user_id = %user.id,
            incident_id = %incident.id,
            severity = incident.severity.as_str(),
            "Incident created"
        );

        self.audit(
            user,
            "create_incident",
            Some(incident.id),
            json!({
                "title": incident.title,
                "severity": incident.severity.as_str(),
            }),
        )
        .await;

        Ok(incident)
    }

    /// Lists incidents matching `filter`, newest first.
    pub async fn list(&self, filter: &IncidentFilter) -> Result<Vec<Incident>, ServiceError> {
        self.reader().await?;
        Ok(self.backend.list_incidents(filter).await?)
    }

    /// Gets one incident by its hyphenated UUID.
    pub async fn get(&self, id: &str) -> Result<Incident, ServiceError> {
        let id = parse_id(id)?;
        self.reader().await?;

        self.backend
            .get_incident(id)
            .await?
            .ok_or_else(|| BackendError::incident_not_found(id).into())
    }

    /// Validates, sanitizes and applies a partial update.
    pub async fn update(&self, id: &str, update: IncidentUpdate) -> Result<Incident, ServiceError> {
        let id = parse_id(id)?;
        let user = self.backend.current_user().await?;
        let user = self.guard.check_incident_update(user.as_ref(), &update)?;

        let update = IncidentUpdate {
            title: update.title.map(|t| self.sanitizer.sanitize(&t)),
            description: update.description.map(|d| self.sanitizer.sanitize(&d)),
            location_data: update.location_data.map(|v| self.sanitizer.sanitize_json(&v)),
            playbook_data: update.playbook_data.map(|v| self.sanitizer.sanitize_json(&v)),
            ..update
        };

        let incident = self.backend.update_incident(id, &update).await?;

        let details = serde_json::to_value(&update)
            .map(strip_nulls)
            .unwrap_or(Value::Null);
        self.audit(user, "update_incident", Some(id), details).await;

        Ok(incident)
    }

    /// Deletes an incident. Requires the `delete` capability.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let id = parse_id(id)?;
        let user = self.backend.current_user().await?;
        let user = self
            .guard
            .require_permission(user.as_ref(), PermissionAction::Delete)?;

        if !self.backend.delete_incident(id).await? {
            return Err(BackendError::incident_not_found(id).into());
        }

        tracing::info!(user_id = %user.id, incident_id = %id, "Incident deleted");
        self.audit(user, "delete_incident", Some(id), json!({})).await;

        Ok(())
    }

    async fn reader(&self) -> Result<(), ServiceError> {
        let user = self.backend.current_user().await?;
        self.guard
            .require_permission(user.as_ref(), PermissionAction::Read)?;
        Ok(())
    }

    async fn audit(&self, user: &UserProfile, action: &str, id: Option<Uuid>, details: Value) {
        let entry = AuditLogEntry::new(
            user.id,
            action,
            "incident",
            id.map(|id| id.to_string()),
            self.sanitizer.sanitize_json(&details),
        );
        record_audit(self.backend.as_ref(), entry).await;
    }
}

fn parse_id(id: &str) -> Result<Uuid, ValidationError> {
    if !is_valid_uuid(id) {
        return Err(ValidationError::InvalidId(id.to_string()));
    }
    Uuid::try_parse(id).map_err(|_| ValidationError::InvalidId(id.to_string()))
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
        }
        other => other,
    }
}

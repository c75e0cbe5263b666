//! Guarded services.
//!
//! Each service resolves the signed-in user, runs the
//! [`AccessGuard`](crate::guard::AccessGuard) checks,
//! performs the backend call and then writes an audit log entry. Audit
//! failures never fail the operation; they are logged and dropped.

mod incident;
mod integration;

pub use incident::IncidentService;
pub use integration::IntegrationService;

use crate::backend::{AuditLogEntry, Backend, BackendError};
use crate::crypto::CryptoError;
use crate::guard::GuardError;
use thiserror::Error;

/// Errors returned by guarded services.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A guard rejected the call before it reached the backend.
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl ServiceError {
    /// Returns the guard rejection, if that is what this is.
    pub fn as_guard(&self) -> Option<&GuardError> {
        match self {
            ServiceError::Guard(e) => Some(e),
            _ => None,
        }
    }

    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Guard(e) => e.user_message(),
            ServiceError::Backend(BackendError::NotFound { entity, .. }) => {
                format!("The requested {} was not found.", entity)
            }
            ServiceError::Backend(_) => "The service is temporarily unavailable.".to_string(),
            ServiceError::Crypto(_) => "Stored credentials could not be processed.".to_string(),
        }
    }
}

impl From<crate::validation::ValidationError> for ServiceError {
    fn from(err: crate::validation::ValidationError) -> Self {
        ServiceError::Guard(GuardError::Validation(err))
    }
}

pub(crate) async fn record_audit(backend: &dyn Backend, entry: AuditLogEntry) {
    if let Err(e) = backend.insert_audit_log_entry(&entry).await {
        tracing::error!(
            action = %entry.action,
            user_id = %entry.user_id,
            error = %e,
            "Failed to write audit log entry"
        );
    }
}

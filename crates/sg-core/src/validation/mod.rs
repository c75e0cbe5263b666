//! Payload validation for guarded operations.
//!
//! This module decides whether a payload is structurally acceptable before
//! any mutating call reaches the backend.
//!
//! # Available Checks
//!
//! - [`validate_integration_payload`] - required credentials per integration kind
//! - [`validate_incident_fields`] - incident title and severity
//! - [`validate_new_incident`] - full incident draft, with typed errors
//! - [`InputSanitizer`] - strips markup and script schemes from free text
//!
//! The `validate_*` functions returning `bool` never fail; the `check_*`
//! variants return a [`ValidationError`] naming the first rule that failed.

mod incident;
mod integration;
pub mod sanitize;

pub use incident::{
    check_incident_fields, check_incident_update, validate_incident_fields, validate_new_incident,
    MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH,
};
pub use integration::{
    check_integration_payload, is_valid_webhook_url, validate_integration_payload,
};
pub use sanitize::{is_valid_uuid, sanitize_json, InputSanitizer};

use thiserror::Error;

/// Reasons a payload was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The integration requires an API key and none was given.
    #[error("API key is required")]
    MissingApiKey,

    /// The integration requires a webhook URL and none was given.
    #[error("webhook URL is required")]
    MissingWebhookUrl,

    /// The webhook URL is not an absolute http(s) URL.
    #[error("webhook URL must be an absolute http or https URL: {0}")]
    InvalidWebhookUrl(String),

    /// The incident title is empty after trimming.
    #[error("title is required")]
    EmptyTitle,

    /// The incident title is too long.
    #[error("title must be at most {MAX_TITLE_LENGTH} characters (got {0})")]
    TitleTooLong(usize),

    /// The incident description is too long.
    #[error("description must be at most {MAX_DESCRIPTION_LENGTH} characters (got {0})")]
    DescriptionTooLong(usize),

    /// The severity is not one of low, medium, high, critical.
    #[error("invalid severity level: {0}")]
    InvalidSeverity(String),

    /// A text field contains a script tag or script URL.
    #[error("invalid characters in {0}")]
    UnsafeContent(&'static str),

    /// An identifier is not a hyphenated UUID.
    #[error("invalid ID format: {0}")]
    InvalidId(String),
}

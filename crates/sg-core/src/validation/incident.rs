//! Incident field validation.

use super::{InputSanitizer, ValidationError};
use crate::incident::{IncidentUpdate, NewIncident, Severity};

/// Maximum incident title length in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum incident description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Markers rejected in free-text fields, compared case-insensitively.
const UNSAFE_MARKERS: &[&str] = &["<script", "javascript:"];

/// Returns true if `title` and `severity` are acceptable for an incident.
pub fn validate_incident_fields(title: &str, severity: &str) -> bool {
    check_incident_fields(title, severity).is_ok()
}

/// Checks title and severity, returning the parsed severity.
pub fn check_incident_fields(title: &str, severity: &str) -> Result<Severity, ValidationError> {
    check_title(title)?;
    Severity::from_db_str(severity)
        .ok_or_else(|| ValidationError::InvalidSeverity(severity.to_string()))
}

/// Validates a complete incident draft.
pub fn validate_new_incident(draft: &NewIncident) -> Result<(), ValidationError> {
    check_incident_fields(&draft.title, draft.severity.as_str())?;
    check_safe("title", &draft.title)?;
    check_sanitized_title(&draft.title)?;
    if let Some(description) = &draft.description {
        check_description(description)?;
    }
    Ok(())
}

/// Validates the fields present in an update.
pub fn check_incident_update(update: &IncidentUpdate) -> Result<(), ValidationError> {
    if let Some(title) = &update.title {
        check_title(title)?;
        check_safe("title", title)?;
        check_sanitized_title(title)?;
    }
    if let Some(description) = &update.description {
        check_description(description)?;
    }
    Ok(())
}

fn check_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let length = title.chars().count();
    if length > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong(length));
    }
    Ok(())
}

/// Titles are sanitized before they are stored; one made only of stripped
/// markup would be stored empty.
fn check_sanitized_title(title: &str) -> Result<(), ValidationError> {
    if InputSanitizer::shared().sanitize(title).is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), ValidationError> {
    let length = description.chars().count();
    if length > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::DescriptionTooLong(length));
    }
    check_safe("description", description)
}

fn check_safe(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let lowered = value.to_lowercase();
    if UNSAFE_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Err(ValidationError::UnsafeContent(field));
    }
    Ok(())
}

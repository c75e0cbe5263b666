//! Integration payload validation.

use super::ValidationError;
use crate::integration::{IntegrationConfig, IntegrationKind};
use url::Url;

/// Returns true if `payload` carries every credential `kind` requires.
///
/// Whitespace-only values count as missing. A required webhook must also be
/// an absolute `http` or `https` URL.
pub fn validate_integration_payload(kind: IntegrationKind, payload: &IntegrationConfig) -> bool {
    check_integration_payload(kind, payload).is_ok()
}

/// Like [`validate_integration_payload`], but reports the failing rule.
pub fn check_integration_payload(
    kind: IntegrationKind,
    payload: &IntegrationConfig,
) -> Result<(), ValidationError> {
    if kind.requires_api_key && is_blank(payload.api_key.as_deref()) {
        return Err(ValidationError::MissingApiKey);
    }

    if kind.requires_webhook {
        let url = match payload.webhook_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(ValidationError::MissingWebhookUrl),
        };
        if !is_valid_webhook_url(url) {
            return Err(ValidationError::InvalidWebhookUrl(url.to_string()));
        }
    }

    Ok(())
}

/// Returns true if `url` parses as an absolute URL with an http(s) scheme and a host.
pub fn is_valid_webhook_url(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

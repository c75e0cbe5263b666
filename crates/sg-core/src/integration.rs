//! Integration configuration models for SOC Guard.
//!
//! This module defines the third-party integrations a user can configure
//! (Splunk, Slack, etc.), which credentials each one requires, and the
//! records stored by the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Required credential fields of an integration class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntegrationKind {
    /// An API key must be supplied.
    pub requires_api_key: bool,
    /// A webhook URL must be supplied.
    pub requires_webhook: bool,
}

impl IntegrationKind {
    /// Kind requiring only an API key.
    pub const API_KEY: Self = Self {
        requires_api_key: true,
        requires_webhook: false,
    };

    /// Kind requiring only a webhook URL.
    pub const WEBHOOK: Self = Self {
        requires_api_key: false,
        requires_webhook: true,
    };

    /// Kind requiring both an API key and a webhook URL.
    pub const API_KEY_AND_WEBHOOK: Self = Self {
        requires_api_key: true,
        requires_webhook: true,
    };
}

/// Integrations supported by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    /// Splunk SIEM (API key and HTTP event collector webhook).
    Splunk,
    /// Slack notifications via incoming webhook.
    Slack,
    /// VirusTotal threat intelligence.
    VirusTotal,
    /// AWS CloudWatch log ingestion.
    CloudWatch,
}

impl IntegrationType {
    /// All integration types.
    pub const ALL: [IntegrationType; 4] = [
        IntegrationType::Splunk,
        IntegrationType::Slack,
        IntegrationType::VirusTotal,
        IntegrationType::CloudWatch,
    ];

    /// Returns the credentials this integration requires.
    pub fn kind(&self) -> IntegrationKind {
        match self {
            IntegrationType::Splunk => IntegrationKind::API_KEY_AND_WEBHOOK,
            IntegrationType::Slack => IntegrationKind::WEBHOOK,
            IntegrationType::VirusTotal | IntegrationType::CloudWatch => IntegrationKind::API_KEY,
        }
    }

    /// Returns the database-compatible string representation (snake_case).
    pub fn as_db_str(&self) -> &'static str {
        match self {
            IntegrationType::Splunk => "splunk",
            IntegrationType::Slack => "slack",
            IntegrationType::VirusTotal => "virus_total",
            IntegrationType::CloudWatch => "cloud_watch",
        }
    }

    /// Parses an integration type from a database string.
    ///
    /// The dashboard's camelCase keys (`virusTotal`, `cloudWatch`) are accepted too.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "splunk" => Some(IntegrationType::Splunk),
            "slack" => Some(IntegrationType::Slack),
            "virus_total" | "virusTotal" => Some(IntegrationType::VirusTotal),
            "cloud_watch" | "cloudWatch" => Some(IntegrationType::CloudWatch),
            _ => None,
        }
    }
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrationType::Splunk => write!(f, "Splunk"),
            IntegrationType::Slack => write!(f, "Slack"),
            IntegrationType::VirusTotal => write!(f, "VirusTotal"),
            IntegrationType::CloudWatch => write!(f, "AWS CloudWatch"),
        }
    }
}

/// User-supplied configuration for one integration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    /// Whether the integration is switched on.
    #[serde(default)]
    pub enabled: bool,
    /// API key (plaintext in memory, encrypted at rest).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Webhook URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl IntegrationConfig {
    /// Creates an enabled config with only an API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            enabled: true,
            api_key: Some(api_key.into()),
            webhook_url: None,
        }
    }

    /// Creates an enabled config with only a webhook URL.
    pub fn with_webhook(webhook_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            api_key: None,
            webhook_url: Some(webhook_url.into()),
        }
    }

    /// Returns a copy with the API key replaced by a mask.
    pub fn masked(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}

/// Integration configuration as persisted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIntegration {
    /// Unique identifier.
    pub id: Uuid,
    /// Owner of the configuration.
    pub user_id: Uuid,
    /// Integration class.
    pub integration_type: IntegrationType,
    /// Configuration with the API key encrypted.
    pub config: IntegrationConfig,
    /// Timestamp when the configuration was first saved.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update.
    pub updated_at: DateTime<Utc>,
}

impl StoredIntegration {
    /// Creates a new stored record.
    pub fn new(
        user_id: Uuid,
        integration_type: IntegrationType,
        config: IntegrationConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            integration_type,
            config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the integration is switched on.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

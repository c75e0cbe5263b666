//! Incident data models for SOC Guard.
//!
//! This module defines the incident record stored by the backend, the
//! payloads used to create and update incidents, and the severity/status
//! filter applied to incident lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Severity levels for incidents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    /// Immediate response required.
    Critical,
}

impl Severity {
    /// Returns the severity name as stored by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Parses a stored severity name. Only the exact lowercase names match.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

/// Error returned when parsing an unknown severity, status or filter value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIncidentError {
    #[error("invalid severity level: {0}")]
    InvalidSeverity(String),
    #[error("invalid incident status: {0}")]
    InvalidStatus(String),
}

impl FromStr for Severity {
    type Err = ParseIncidentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(ParseIncidentError::InvalidSeverity(s.to_string())),
        }
    }
}

/// Status of an incident.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IncidentStatus {
    /// Open and not yet being worked.
    #[default]
    Active,
    /// An analyst is investigating.
    UnderInvestigation,
    /// Closed.
    Resolved,
}

impl IncidentStatus {
    /// Returns the status name as stored by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Active => "active",
            IncidentStatus::UnderInvestigation => "under-investigation",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncidentStatus::Active => write!(f, "Active"),
            IncidentStatus::UnderInvestigation => write!(f, "Under Investigation"),
            IncidentStatus::Resolved => write!(f, "Resolved"),
        }
    }
}

impl FromStr for IncidentStatus {
    type Err = ParseIncidentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(IncidentStatus::Active),
            "under-investigation" | "under_investigation" => {
                Ok(IncidentStatus::UnderInvestigation)
            }
            "resolved" => Ok(IncidentStatus::Resolved),
            _ => Err(ParseIncidentError::InvalidStatus(s.to_string())),
        }
    }
}

/// A security incident as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier.
    pub id: Uuid,
    /// Short summary.
    pub title: String,
    /// Longer description.
    pub description: Option<String>,
    pub severity: Severity,
    pub status: IncidentStatus,
    /// Analyst the incident is assigned to.
    pub assigned_analyst_id: Option<Uuid>,
    /// Geolocation payload shown on the incident map.
    pub location_data: Option<serde_json::Value>,
    /// Playbook progress payload.
    pub playbook_data: Option<serde_json::Value>,
    /// User who created the incident.
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set once the incident is resolved.
    pub resolution_time: Option<DateTime<Utc>>,
}

impl Incident {
    /// Creates a stored incident from a (validated, sanitized) draft.
    pub fn from_new(draft: NewIncident, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            severity: draft.severity,
            status: draft.status.unwrap_or_default(),
            assigned_analyst_id: draft.assigned_analyst_id,
            location_data: draft.location_data,
            playbook_data: draft.playbook_data,
            created_by,
            created_at: now,
            updated_at: now,
            resolution_time: None,
        }
    }

    /// Applies a partial update.
    pub fn apply_update(&mut self, update: &IncidentUpdate) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        if let Some(severity) = update.severity {
            self.severity = severity;
        }
        if let Some(status) = update.status {
            if status == IncidentStatus::Resolved && self.status != IncidentStatus::Resolved {
                self.resolution_time = Some(Utc::now());
            }
            self.status = status;
        }
        if let Some(analyst) = update.assigned_analyst_id {
            self.assigned_analyst_id = Some(analyst);
        }
        if let Some(location) = &update.location_data {
            self.location_data = Some(location.clone());
        }
        if let Some(playbook) = &update.playbook_data {
            self.playbook_data = Some(playbook.clone());
        }
        if let Some(resolved_at) = update.resolution_time {
            self.resolution_time = Some(resolved_at);
        }
        self.updated_at = Utc::now();
    }
}

/// Payload for creating an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncident {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub severity: Severity,
    #[serde(default)]
    pub status: Option<IncidentStatus>,
    #[serde(default)]
    pub assigned_analyst_id: Option<Uuid>,
    #[serde(default)]
    pub location_data: Option<serde_json::Value>,
    #[serde(default)]
    pub playbook_data: Option<serde_json::Value>,
}

impl NewIncident {
    /// Creates a draft with only the required fields.
    pub fn new(title: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: None,
            severity,
            status: None,
            assigned_analyst_id: None,
            location_data: None,
            playbook_data: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update for an incident. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub severity: Option<Severity>,
    pub status: Option<IncidentStatus>,
    pub assigned_analyst_id: Option<Uuid>,
    pub location_data: Option<serde_json::Value>,
    pub playbook_data: Option<serde_json::Value>,
    pub resolution_time: Option<DateTime<Utc>>,
}

/// Severity/status filter for incident lists. `None` matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentFilter {
    pub severity: Option<Severity>,
    pub status: Option<IncidentStatus>,
}

impl IncidentFilter {
    /// Builds a filter from the dashboard's selector values, where `"all"`
    /// disables that criterion.
    pub fn from_selectors(severity: &str, status: &str) -> Result<Self, ParseIncidentError> {
        let severity = match severity {
            "" | "all" => None,
            s => Some(s.parse()?),
        };
        let status = match status {
            "" | "all" => None,
            s => Some(s.parse()?),
        };
        Ok(Self { severity, status })
    }

    /// Returns true if the incident satisfies every set criterion.
    pub fn matches(&self, incident: &Incident) -> bool {
        self.severity.map_or(true, |s| incident.severity == s)
            && self.status.map_or(true, |s| incident.status == s)
    }

    /// Returns the matching incidents, newest first.
    pub fn apply(&self, incidents: Vec<Incident>) -> Vec<Incident> {
        let mut matching: Vec<Incident> =
            incidents.into_iter().filter(|i| self.matches(i)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn incident(severity: Severity, status: IncidentStatus, age_minutes: i64) -> Incident {
        let mut incident = Incident::from_new(NewIncident::new("Test", severity), Uuid::new_v4());
        incident.status = status;
        incident.created_at = Utc::now() - Duration::minutes(age_minutes);
        incident
    }

    #[test]
    fn test_severity_parse_and_order() {
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert!("bogus".parse::<Severity>().is_err());
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_status_serde_kebab_case() {
        let json = serde_json::to_string(&IncidentStatus::UnderInvestigation).unwrap();
        assert_eq!(json, "\"under-investigation\"");
        assert_eq!(
            "under-investigation".parse::<IncidentStatus>(),
            Ok(IncidentStatus::UnderInvestigation)
        );
    }

    #[test]
    fn test_filter_from_selectors() {
        let filter = IncidentFilter::from_selectors("all", "all").unwrap();
        assert_eq!(filter, IncidentFilter::default());

        let filter = IncidentFilter::from_selectors("high", "resolved").unwrap();
        assert_eq!(filter.severity, Some(Severity::High));
        assert_eq!(filter.status, Some(IncidentStatus::Resolved));

        assert!(IncidentFilter::from_selectors("urgent", "all").is_err());
        assert!(IncidentFilter::from_selectors("all", "closed").is_err());
    }

    #[test]
    fn test_filter_apply() {
        let incidents = vec![
            incident(Severity::High, IncidentStatus::Active, 30),
            incident(Severity::High, IncidentStatus::Resolved, 20),
            incident(Severity::Critical, IncidentStatus::Active, 10),
            incident(Severity::High, IncidentStatus::Active, 5),
        ];

        let high_active = IncidentFilter {
            severity: Some(Severity::High),
            status: Some(IncidentStatus::Active),
        }
        .apply(incidents.clone());
        assert_eq!(high_active.len(), 2);
        assert!(high_active[0].created_at > high_active[1].created_at);

        let all = IncidentFilter::default().apply(incidents);
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].severity, Severity::High);
        assert_eq!(all[1].severity, Severity::Critical);
    }

    #[test]
    fn test_apply_update_sets_resolution_time() {
        let mut incident = incident(Severity::Low, IncidentStatus::Active, 0);
        assert!(incident.resolution_time.is_none());

        incident.apply_update(&IncidentUpdate {
            status: Some(IncidentStatus::Resolved),
            title: Some("Closed out".to_string()),
            ..Default::default()
        });

        assert_eq!(incident.status, IncidentStatus::Resolved);
        assert_eq!(incident.title, "Closed out");
        assert!(incident.resolution_time.is_some());
    }
}

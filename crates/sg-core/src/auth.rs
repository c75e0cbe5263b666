//! Roles and permission checks for SOC Guard.
//!
//! This module provides:
//! - The [`Role`] and [`PermissionAction`] enums
//! - The static, fail-closed role capability table
//! - The [`UserProfile`] returned by the auth backend, including the
//!   account-active flag

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// User role for role-based access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including deletes.
    Admin,
    /// Can create, read and update incidents and integrations.
    Analyst,
    /// Read-only access to dashboards and incidents.
    #[default]
    Viewer,
}

impl Role {
    /// Returns the role name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Analyst => "analyst",
            Role::Viewer => "viewer",
        }
    }

    /// Returns the actions granted to this role.
    pub fn permitted_actions(&self) -> &'static [PermissionAction] {
        match self {
            Role::Admin => &[
                PermissionAction::Create,
                PermissionAction::Read,
                PermissionAction::Update,
                PermissionAction::Delete,
            ],
            Role::Analyst => &[
                PermissionAction::Create,
                PermissionAction::Read,
                PermissionAction::Update,
            ],
            Role::Viewer => &[PermissionAction::Read],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown role or action name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAuthError {
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("unknown permission action: {0}")]
    UnknownAction(String),
}

impl FromStr for Role {
    type Err = ParseAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "analyst" => Ok(Role::Analyst),
            "viewer" => Ok(Role::Viewer),
            _ => Err(ParseAuthError::UnknownRole(s.to_string())),
        }
    }
}

/// Operation a caller wants to perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    Create,
    Read,
    Update,
    Delete,
}

impl PermissionAction {
    /// Returns the action name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::Create => "create",
            PermissionAction::Read => "read",
            PermissionAction::Update => "update",
            PermissionAction::Delete => "delete",
        }
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PermissionAction {
    type Err = ParseAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(PermissionAction::Create),
            "read" => Ok(PermissionAction::Read),
            "update" => Ok(PermissionAction::Update),
            "delete" => Ok(PermissionAction::Delete),
            _ => Err(ParseAuthError::UnknownAction(s.to_string())),
        }
    }
}

/// Returns true if `role` may perform `action`.
///
/// Anything missing from the capability table is denied.
pub fn is_action_permitted(role: Role, action: PermissionAction) -> bool {
    role.permitted_actions().contains(&action)
}

/// Returns true if the profile's account is active and its role permits `action`.
///
/// Inactive accounts are denied before the role table is consulted.
pub fn is_profile_permitted(profile: &UserProfile, action: PermissionAction) -> bool {
    profile.is_active && is_action_permitted(profile.role, action)
}

/// Profile of the signed-in user, as reported by the auth backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique identifier.
    pub id: Uuid,
    /// User role.
    pub role: Role,
    /// Whether the account is active.
    pub is_active: bool,
    /// Display name (optional).
    pub display_name: Option<String>,
}

impl UserProfile {
    /// Creates an active profile with the given role.
    pub fn new(role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            is_active: true,
            display_name: None,
        }
    }

    /// Returns the same profile marked inactive.
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Returns the display name, falling back to the user id.
    pub fn display(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

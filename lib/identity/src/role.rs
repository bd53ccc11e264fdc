//! Dashboard roles.
//!
//! The role comes from the `custom:role` user attribute. Users without one
//! are patients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a dashboard user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Sees their own measurements.
    #[default]
    Patient,
    /// Sees the measurements of assigned patients.
    Doctor,
    /// Full access to the system and its configuration.
    Admin,
    /// A role value this client does not know.
    Other(String),
}

impl Role {
    /// Parses the `custom:role` attribute, defaulting to `Patient`.
    #[must_use]
    pub fn from_claim(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("patient") => Self::Patient,
            Some("doctor") => Self::Doctor,
            Some("admin") | Some("administrator") => Self::Admin,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    /// Returns the attribute value for this role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Admin => "admin",
            Self::Other(value) => value,
        }
    }

    /// Returns the display name of the role.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Admin => "Administrator",
            Self::Doctor => "Doctor",
            Self::Patient | Self::Other(_) => "Patient",
        }
    }

    /// Returns a one-line description of what the role may see.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Admin => "Full access to the system and its configuration",
            Self::Doctor => "Access to assigned patients and their data",
            Self::Patient | Self::Other(_) => "Access to your own health data",
        }
    }

    /// Returns true if this role has admin privileges.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::from_claim(Some(value.as_str()))
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_role_is_patient() {
        assert_eq!(Role::from_claim(None), Role::Patient);
        assert_eq!(Role::from_claim(Some("")), Role::Patient);
        assert_eq!(Role::from_claim(None).as_str(), "patient");
    }

    #[test]
    fn administrator_aliases_admin() {
        assert_eq!(Role::from_claim(Some("admin")), Role::Admin);
        assert_eq!(Role::from_claim(Some("administrator")), Role::Admin);
        assert!(Role::Admin.is_admin());
        assert!(!Role::Doctor.is_admin());
    }

    #[test]
    fn unknown_role_is_kept() {
        let role = Role::from_claim(Some("nurse"));
        assert_eq!(role, Role::Other("nurse".to_string()));
        assert_eq!(role.as_str(), "nurse");
        assert_eq!(role.label(), "Patient");
    }

    #[test]
    fn role_serializes_as_claim_value() {
        let json = serde_json::to_string(&Role::Doctor).expect("serialize");
        assert_eq!(json, "\"doctor\"");
        let parsed: Role = serde_json::from_str("\"administrator\"").expect("deserialize");
        assert_eq!(parsed, Role::Admin);
    }
}

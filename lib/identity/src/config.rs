//! Identity provider (user pool) configuration.
//!
//! This module provides configuration types for connecting to the hosted
//! user pool that authenticates dashboard users.

use serde::{Deserialize, Serialize};

/// Configuration for the identity provider's user pool.
///
/// An empty `user_pool_id` or `client_id` means sign-in is not configured;
/// the Session Manager then never builds a provider handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoolConfig {
    /// The user pool ID (e.g., "us-east-1_AbCdEf123").
    #[serde(default)]
    user_pool_id: String,
    /// The app client ID registered with the user pool.
    #[serde(default)]
    client_id: String,
    /// The region hosting the user pool. Derived from the pool ID if empty.
    #[serde(default)]
    region: String,
}

impl UserPoolConfig {
    /// Creates a new user pool configuration.
    #[must_use]
    pub fn new(user_pool_id: String, client_id: String) -> Self {
        Self {
            user_pool_id,
            client_id,
            region: String::new(),
        }
    }

    /// Sets the region explicitly.
    #[must_use]
    pub fn with_region(mut self, region: String) -> Self {
        self.region = region;
        self
    }

    /// Returns the user pool ID.
    #[must_use]
    pub fn user_pool_id(&self) -> &str {
        &self.user_pool_id
    }

    /// Returns the app client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the region, falling back to the prefix of the pool ID.
    #[must_use]
    pub fn region(&self) -> &str {
        if !self.region.is_empty() {
            return &self.region;
        }
        self.user_pool_id
            .split_once('_')
            .map(|(region, _)| region)
            .unwrap_or_default()
    }

    /// Returns true if both the pool ID and the client ID are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.user_pool_id.trim().is_empty() && !self.client_id.trim().is_empty()
    }

    /// Returns the provider's RPC endpoint for this pool's region.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("https://cognito-idp.{}.amazonaws.com/", self.region())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_derived_from_pool_id() {
        let config = UserPoolConfig::new("eu-west-1_AbCdEf".to_string(), "client".to_string());
        assert_eq!(config.region(), "eu-west-1");
        assert_eq!(
            config.endpoint(),
            "https://cognito-idp.eu-west-1.amazonaws.com/"
        );
    }

    #[test]
    fn explicit_region_wins() {
        let config = UserPoolConfig::new("eu-west-1_AbCdEf".to_string(), "client".to_string())
            .with_region("us-east-1".to_string());
        assert_eq!(config.region(), "us-east-1");
    }

    #[test]
    fn unconfigured_when_ids_missing() {
        assert!(!UserPoolConfig::default().is_configured());
        assert!(!UserPoolConfig::new("us-east-1_x".to_string(), " ".to_string()).is_configured());
        assert!(UserPoolConfig::new("us-east-1_x".to_string(), "abc".to_string()).is_configured());
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{ "user_pool_id": "us-east-1_Pool", "client_id": "abc" }"#;
        let config: UserPoolConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.client_id(), "abc");
        assert_eq!(config.region(), "us-east-1");
    }
}

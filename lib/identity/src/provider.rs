//! The identity-provider seam.
//!
//! The Session Manager talks to the hosted identity provider only through
//! these traits. [`crate::cognito`] implements them against a real user
//! pool; tests substitute in-memory doubles.

use async_trait::async_trait;
use chrono::Utc;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::UserPoolConfig;
use crate::error::ProviderError;
use crate::token::IdToken;

/// A named user attribute held by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserAttribute {
    /// Attribute name (e.g., "email", "custom:role").
    pub name: String,
    /// Attribute value.
    pub value: String,
}

impl UserAttribute {
    /// Creates a new attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The token set of a provider session.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSession {
    id_token: IdToken,
    access_token: String,
    refresh_token: String,
}

impl ProviderSession {
    /// Creates a provider session from its three tokens.
    #[must_use]
    pub fn new(id_token: IdToken, access_token: String, refresh_token: String) -> Self {
        Self {
            id_token,
            access_token,
            refresh_token,
        }
    }

    /// Returns the ID token.
    #[must_use]
    pub fn id_token(&self) -> &IdToken {
        &self.id_token
    }

    /// Returns the serialized access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the serialized refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Returns true if the ID token has not yet expired.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.id_token
            .expires_at()
            .is_ok_and(|expires_at| expires_at > Utc::now())
    }
}

impl fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSession")
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

/// Outcome of an interactive authentication exchange.
#[derive(Debug)]
pub enum AuthOutcome {
    /// The provider issued a session.
    Success(ProviderSession),
    /// The provider requires a new credential first (e.g. a forced
    /// password change on first login).
    NewCredentialRequired(Vec<UserAttribute>),
    /// The provider rejected the attempt.
    Failure(Report<ProviderError>),
}

/// Operations the Session Manager needs from an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the username of the user whose session the provider has
    /// persisted, if any.
    async fn current_user(&self) -> Option<String>;

    /// Retrieves the user's session, refreshing its tokens if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if no session is stored or it cannot be refreshed.
    async fn get_session(&self, username: &str) -> Result<ProviderSession, Report<ProviderError>>;

    /// Retrieves the user's attribute set.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the session or is unreachable.
    async fn user_attributes(
        &self,
        username: &str,
        session: &ProviderSession,
    ) -> Result<Vec<UserAttribute>, Report<ProviderError>>;

    /// Runs the interactive authentication exchange.
    async fn authenticate(&self, identifier: &str, secret: &str) -> AuthOutcome;

    /// Terminates the user's session at the provider.
    async fn sign_out(&self, username: &str);
}

/// Builds provider handles from user pool configuration.
pub trait ProviderConnector: Send + Sync {
    /// Constructs a handle for the given user pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle cannot be built from the configuration.
    fn connect(
        &self,
        pool: &UserPoolConfig,
    ) -> Result<Arc<dyn IdentityProvider>, Report<ProviderError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::id_token_expiring_in;

    #[test]
    fn session_with_future_expiry_is_valid() {
        let session = ProviderSession::new(
            id_token_expiring_in(600, serde_json::json!({})),
            "access".to_string(),
            "refresh".to_string(),
        );
        assert!(session.is_valid());
        assert_eq!(session.access_token(), "access");
        assert_eq!(session.refresh_token(), "refresh");
    }

    #[test]
    fn expired_session_is_invalid() {
        let session = ProviderSession::new(
            id_token_expiring_in(-1, serde_json::json!({})),
            "access".to_string(),
            "refresh".to_string(),
        );
        assert!(!session.is_valid());
    }

    #[test]
    fn undecodable_session_is_invalid() {
        let session = ProviderSession::new(
            IdToken::new("garbage"),
            "access".to_string(),
            "refresh".to_string(),
        );
        assert!(!session.is_valid());
    }

    #[test]
    fn attribute_uses_provider_field_names() {
        let attr: UserAttribute =
            serde_json::from_str(r#"{"Name":"email","Value":"a@b.com"}"#).expect("deserialize");
        assert_eq!(attr, UserAttribute::new("email", "a@b.com"));
    }

    #[test]
    fn session_debug_hides_tokens() {
        let session = ProviderSession::new(
            id_token_expiring_in(600, serde_json::json!({})),
            "secret-access".to_string(),
            "secret-refresh".to_string(),
        );
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }
}

//! The authenticated-principal record.
//!
//! A `Session` is assembled from a provider session and the user's
//! attribute set once both have been retrieved. It is never modified
//! afterwards: a changed claim set produces a new `Session`.

use rootcause::prelude::Report;
use serde::Serialize;
use std::fmt;

use crate::error::ProviderError;
use crate::provider::{ProviderSession, UserAttribute};
use crate::role::Role;
use crate::token::groups_from_payload;

/// Attribute holding the user's email address.
pub const EMAIL_ATTRIBUTE: &str = "email";
/// Attribute holding the user's display name.
pub const NAME_ATTRIBUTE: &str = "name";
/// Attribute holding the user's dashboard role.
pub const ROLE_ATTRIBUTE: &str = "custom:role";

/// The serialized tokens backing a session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    id_token: String,
    access_token: String,
    refresh_token: String,
}

impl SessionTokens {
    /// Creates a token triple.
    #[must_use]
    pub fn new(id_token: String, access_token: String, refresh_token: String) -> Self {
        Self {
            id_token,
            access_token,
            refresh_token,
        }
    }

    /// Returns the ID token, used as the backend bearer token.
    #[must_use]
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

impl From<&ProviderSession> for SessionTokens {
    fn from(session: &ProviderSession) -> Self {
        Self::new(
            session.id_token().as_str().to_string(),
            session.access_token().to_string(),
            session.refresh_token().to_string(),
        )
    }
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens").finish_non_exhaustive()
    }
}

/// An authenticated dashboard user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    username: String,
    email: String,
    display_name: String,
    role: Role,
    groups: Vec<String>,
    #[serde(skip)]
    tokens: SessionTokens,
}

impl Session {
    /// Creates a session with default claims: no email or name, the
    /// patient role and no groups.
    #[must_use]
    pub fn new(username: String, tokens: SessionTokens) -> Self {
        Self {
            username,
            email: String::new(),
            display_name: String::new(),
            role: Role::default(),
            groups: Vec::new(),
            tokens,
        }
    }

    /// Sets the email claim.
    #[must_use]
    pub fn with_email(mut self, email: String) -> Self {
        self.email = email;
        self
    }

    /// Sets the display name claim.
    #[must_use]
    pub fn with_display_name(mut self, display_name: String) -> Self {
        self.display_name = display_name;
        self
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Sets the groups.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Assembles a session from a provider session and its user's attributes.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidToken`] if the ID token payload
    /// cannot be decoded. No partially-filled session is produced.
    pub fn from_provider(
        username: &str,
        session: &ProviderSession,
        attributes: &[UserAttribute],
    ) -> Result<Self, Report<ProviderError>> {
        let payload = session.id_token().decode_payload()?;

        let mut email = String::new();
        let mut display_name = String::new();
        let mut role = None;
        for attribute in attributes {
            match attribute.name.as_str() {
                EMAIL_ATTRIBUTE => email.clone_from(&attribute.value),
                NAME_ATTRIBUTE => display_name.clone_from(&attribute.value),
                ROLE_ATTRIBUTE => role = Some(attribute.value.as_str()),
                _ => {}
            }
        }

        Ok(Self::new(username.to_string(), SessionTokens::from(session))
            .with_email(email)
            .with_display_name(display_name)
            .with_role(Role::from_claim(role))
            .with_groups(groups_from_payload(&payload)))
    }

    /// Returns the provider username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the email address, or an empty string.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name, or an empty string.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the user's role.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns the user's groups in token order.
    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Returns the session tokens.
    #[must_use]
    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    /// Returns true if the user has admin access.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::IdToken;
    use crate::token::tests::{id_token_expiring_in, jwt};

    fn provider_session(extra_claims: serde_json::Value) -> ProviderSession {
        ProviderSession::new(
            id_token_expiring_in(3600, extra_claims),
            "access-token".to_string(),
            "refresh-token".to_string(),
        )
    }

    #[test]
    fn email_only_attributes_use_defaults() {
        let session = Session::from_provider(
            "a@b.com",
            &provider_session(serde_json::json!({})),
            &[UserAttribute::new("email", "a@b.com")],
        )
        .expect("session");

        assert_eq!(session.username(), "a@b.com");
        assert_eq!(session.email(), "a@b.com");
        assert_eq!(session.display_name(), "");
        assert_eq!(session.role().as_str(), "patient");
        assert!(session.groups().is_empty());
    }

    #[test]
    fn recognized_attributes_are_mapped() {
        let session = Session::from_provider(
            "dr-house",
            &provider_session(serde_json::json!({"cognito:groups": ["doctors", "oncall"]})),
            &[
                UserAttribute::new("email", "house@example.com"),
                UserAttribute::new("name", "Gregory House"),
                UserAttribute::new("custom:role", "doctor"),
                UserAttribute::new("phone_number", "+15550100"),
            ],
        )
        .expect("session");

        assert_eq!(session.email(), "house@example.com");
        assert_eq!(session.display_name(), "Gregory House");
        assert_eq!(session.role(), &Role::Doctor);
        assert_eq!(session.groups(), ["doctors", "oncall"]);
    }

    #[test]
    fn tokens_are_copied_from_provider_session() {
        let provider = provider_session(serde_json::json!({}));
        let session = Session::from_provider("u", &provider, &[]).expect("session");

        assert_eq!(session.tokens().id_token(), provider.id_token().as_str());
        assert_eq!(session.tokens().access_token(), "access-token");
        assert_eq!(session.tokens().refresh_token(), "refresh-token");
    }

    #[test]
    fn undecodable_id_token_fails_extraction() {
        let provider = ProviderSession::new(
            IdToken::new("not.a-jwt"),
            "access".to_string(),
            "refresh".to_string(),
        );
        assert!(Session::from_provider("u", &provider, &[]).is_err());
    }

    #[test]
    fn role_defaults_even_with_other_attributes() {
        let provider = ProviderSession::new(
            IdToken::new(jwt(&serde_json::json!({"sub": "x"}))),
            "access".to_string(),
            "refresh".to_string(),
        );
        let session = Session::from_provider(
            "u",
            &provider,
            &[UserAttribute::new("name", "Pat"), UserAttribute::new("locale", "es")],
        )
        .expect("session");
        assert_eq!(session.role(), &Role::Patient);
    }

    #[test]
    fn admin_role_grants_admin() {
        let session = Session::new(
            "root".to_string(),
            SessionTokens::new("i".to_string(), "a".to_string(), "r".to_string()),
        )
        .with_role(Role::Admin);
        assert!(session.is_admin());
    }

    #[test]
    fn session_debug_hides_tokens() {
        let session = Session::new(
            "u".to_string(),
            SessionTokens::new(
                "secret-id".to_string(),
                "secret-access".to_string(),
                "secret-refresh".to_string(),
            ),
        );
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret-id"));
        assert!(!debug.contains("secret-access"));
    }
}

//! Error types for the identity crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ProviderError`: Failures talking to the identity provider or its token storage
//! - `SessionError`: Session Manager failures surfaced to the application

use crate::provider::UserAttribute;
use std::fmt;

/// Errors from the identity provider and its token storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached.
    Unreachable { reason: String },
    /// The provider rejected the request.
    Service { code: String, message: String },
    /// No stored tokens exist for the user.
    NoStoredSession { username: String },
    /// A provider-issued token could not be decoded.
    InvalidToken { reason: String },
    /// The provider's token storage failed.
    Storage { reason: String },
    /// The provider answered with a response this client does not understand.
    UnexpectedResponse { reason: String },
}

impl ProviderError {
    /// Returns the provider error code, or a local code for client-side failures.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Unreachable { .. } => "NetworkError",
            Self::Service { code, .. } => code,
            Self::NoStoredSession { .. } => "NoStoredSession",
            Self::InvalidToken { .. } => "InvalidToken",
            Self::Storage { .. } => "StorageError",
            Self::UnexpectedResponse { .. } => "UnexpectedResponse",
        }
    }

    /// Returns the human-readable part of the error.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Service { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { reason } => {
                write!(f, "identity provider unreachable: {reason}")
            }
            Self::Service { code, message } => {
                write!(f, "identity provider error {code}: {message}")
            }
            Self::NoStoredSession { username } => {
                write!(f, "no stored session for user '{username}'")
            }
            Self::InvalidToken { reason } => {
                write!(f, "invalid token: {reason}")
            }
            Self::Storage { reason } => {
                write!(f, "token storage failed: {reason}")
            }
            Self::UnexpectedResponse { reason } => {
                write!(f, "unexpected identity provider response: {reason}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Classification of an authentication failure, by provider error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFailureKind {
    /// Wrong identifier or secret.
    InvalidCredentials,
    /// The identifier is unknown to the provider.
    UserNotFound,
    /// The account exists but has not been confirmed.
    UserNotConfirmed,
    /// The provider could not be reached.
    Network,
    /// Anything else.
    Other,
}

impl AuthFailureKind {
    /// Classifies a provider error code.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "NotAuthorizedException" => Self::InvalidCredentials,
            "UserNotFoundException" => Self::UserNotFound,
            "UserNotConfirmedException" => Self::UserNotConfirmed,
            "NetworkError" => Self::Network,
            _ => Self::Other,
        }
    }
}

/// Errors from Session Manager operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// An operation needing a provider handle ran before `initialize`
    /// produced one.
    NotInitialized,
    /// The provider rejected the login attempt.
    Authentication {
        kind: AuthFailureKind,
        code: String,
        message: String,
    },
    /// The provider requires a new credential before issuing a session.
    CredentialChangeRequired { attributes: Vec<UserAttribute> },
}

impl SessionError {
    /// Creates an authentication error from a provider failure.
    #[must_use]
    pub fn authentication(error: &ProviderError) -> Self {
        let code = error.code().to_string();
        Self::Authentication {
            kind: AuthFailureKind::from_code(&code),
            code,
            message: error.message(),
        }
    }

    /// Returns text suitable for showing to the person logging in.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotInitialized => "Sign-in is not available right now.".to_string(),
            Self::CredentialChangeRequired { .. } => {
                "You must change your password before signing in.".to_string()
            }
            Self::Authentication { kind, message, .. } => match kind {
                AuthFailureKind::InvalidCredentials => "Incorrect email or password.".to_string(),
                AuthFailureKind::UserNotFound => "User not found.".to_string(),
                AuthFailureKind::UserNotConfirmed => {
                    "Account not confirmed. Please verify your email.".to_string()
                }
                AuthFailureKind::Network => {
                    "Could not reach the sign-in service. Try again.".to_string()
                }
                AuthFailureKind::Other if message.is_empty() => "Sign-in failed.".to_string(),
                AuthFailureKind::Other => message.clone(),
            },
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "session manager is not initialized"),
            Self::Authentication { code, message, .. } => {
                write!(f, "authentication failed ({code}): {message}")
            }
            Self::CredentialChangeRequired { attributes } => {
                write!(
                    f,
                    "credential change required ({} attributes supplied)",
                    attributes.len()
                )
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_service_display() {
        let err = ProviderError::Service {
            code: "NotAuthorizedException".to_string(),
            message: "Incorrect username or password.".to_string(),
        };
        assert!(err.to_string().contains("NotAuthorizedException"));
        assert!(err.to_string().contains("Incorrect username"));
        assert_eq!(err.code(), "NotAuthorizedException");
        assert_eq!(err.message(), "Incorrect username or password.");
    }

    #[test]
    fn provider_error_local_codes() {
        let err = ProviderError::Unreachable {
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.code(), "NetworkError");
        assert!(err.message().contains("connection refused"));
    }

    #[test]
    fn failure_kind_from_code() {
        assert_eq!(
            AuthFailureKind::from_code("NotAuthorizedException"),
            AuthFailureKind::InvalidCredentials
        );
        assert_eq!(
            AuthFailureKind::from_code("UserNotFoundException"),
            AuthFailureKind::UserNotFound
        );
        assert_eq!(
            AuthFailureKind::from_code("UserNotConfirmedException"),
            AuthFailureKind::UserNotConfirmed
        );
        assert_eq!(
            AuthFailureKind::from_code("LimitExceededException"),
            AuthFailureKind::Other
        );
    }

    #[test]
    fn authentication_error_keeps_provider_code_and_message() {
        let provider = ProviderError::Service {
            code: "UserNotConfirmedException".to_string(),
            message: "User is not confirmed.".to_string(),
        };
        let err = SessionError::authentication(&provider);
        match &err {
            SessionError::Authentication {
                kind,
                code,
                message,
            } => {
                assert_eq!(*kind, AuthFailureKind::UserNotConfirmed);
                assert_eq!(code, "UserNotConfirmedException");
                assert_eq!(message, "User is not confirmed.");
            }
            other => panic!("expected Authentication, got {other:?}"),
        }
        assert!(err.user_message().contains("not confirmed"));
    }

    #[test]
    fn unknown_failure_shows_provider_message() {
        let provider = ProviderError::Service {
            code: "PasswordResetRequiredException".to_string(),
            message: "Password reset required for the user".to_string(),
        };
        let err = SessionError::authentication(&provider);
        assert_eq!(err.user_message(), "Password reset required for the user");
    }

    #[test]
    fn credential_change_display() {
        let err = SessionError::CredentialChangeRequired {
            attributes: vec![UserAttribute::new("email", "a@b.com")],
        };
        assert!(err.to_string().contains("credential change required"));
        assert!(err.user_message().contains("change your password"));
    }

    #[test]
    fn not_initialized_display() {
        let err = SessionError::NotInitialized;
        assert!(err.to_string().contains("not initialized"));
    }
}

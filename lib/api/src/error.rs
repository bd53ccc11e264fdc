//! Error types for the API client.

use std::fmt;

/// Errors from backend API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// A data operation ran before a client was installed.
    ClientNotInitialized,
    /// The backend rejected the bearer token (HTTP 401).
    Unauthorized { path: String },
    /// The request did not complete within the configured timeout.
    Timeout { path: String },
    /// The backend could not be reached.
    Connection { path: String, reason: String },
    /// The backend answered with a non-success status other than 401.
    Status {
        path: String,
        status: u16,
        body: String,
    },
    /// The response body was not JSON.
    Decode { path: String, reason: String },
    /// The configured base URL is not a valid URL.
    InvalidUrl { url: String, reason: String },
}

impl ApiError {
    /// Returns the request path this error belongs to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { path }
            | Self::Timeout { path }
            | Self::Connection { path, .. }
            | Self::Status { path, .. }
            | Self::Decode { path, .. } => Some(path),
            Self::ClientNotInitialized | Self::InvalidUrl { .. } => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientNotInitialized => {
                write!(f, "API client not initialized")
            }
            Self::Unauthorized { path } => {
                write!(f, "unauthorized request to {path}; session expired")
            }
            Self::Timeout { path } => {
                write!(f, "request to {path} timed out")
            }
            Self::Connection { path, reason } => {
                write!(f, "request to {path} failed: {reason}")
            }
            Self::Status { path, status, body } => {
                if body.is_empty() {
                    write!(f, "request to {path} returned HTTP {status}")
                } else {
                    write!(f, "request to {path} returned HTTP {status}: {body}")
                }
            }
            Self::Decode { path, reason } => {
                write!(f, "invalid response from {path}: {reason}")
            }
            Self::InvalidUrl { url, reason } => {
                write!(f, "invalid API base URL '{url}': {reason}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

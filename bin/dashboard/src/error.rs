//! Domain error types for the dashboard binary.

use std::fmt;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Local settings could not be loaded from the environment.
    Load { details: String },
    /// The runtime configuration document could not be fetched.
    Fetch { url: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { details } => write!(f, "failed to load settings: {details}"),
            Self::Fetch { url, reason } => {
                write!(f, "failed to fetch runtime configuration from {url}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(error: config::ConfigError) -> Self {
        Self::Load {
            details: error.to_string(),
        }
    }
}

/// Errors from application commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Startup could not complete.
    Startup { details: String },
    /// Interactive input failed.
    Prompt { details: String },
    /// The command needs a session and none is held.
    NotLoggedIn,
    /// Login did not produce a session.
    LoginFailed { details: String },
    /// A backend request failed.
    Request { details: String },
    /// A result could not be written out.
    Output { details: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup { details } => write!(f, "startup failed: {details}"),
            Self::Prompt { details } => write!(f, "failed to read input: {details}"),
            Self::NotLoggedIn => write!(f, "not logged in; run `bpm-dashboard login`"),
            Self::LoginFailed { details } => write!(f, "login failed: {details}"),
            Self::Request { details } => write!(f, "request failed: {details}"),
            Self::Output { details } => write!(f, "failed to render output: {details}"),
        }
    }
}

impl std::error::Error for AppError {}

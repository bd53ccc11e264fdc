//! Session lifecycle and identity-provider integration for bpm-dashboard.
//!
//! This crate provides:
//! - The Session Manager (`SessionManager`, `AuthState`)
//! - The authenticated principal (`Session`, `Role`)
//! - The identity-provider seam (`IdentityProvider`, `ProviderConnector`)
//! - A Cognito user pool provider with pluggable token storage
//!
//! # Lifecycle
//!
//! A manager starts `Uninitialized`. `initialize` builds the provider handle
//! and silently restores a persisted session; `login` and `logout` move
//! between `Authenticated` and `Unauthenticated`. The ID token of the current
//! session is what the API client sends as its bearer token.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bpm_dashboard_identity::{
//!     CognitoConnector, MemoryTokenStore, SessionManager, UserPoolConfig,
//! };
//!
//! # async fn run() {
//! let pool = UserPoolConfig::new("us-east-1_AbCdEf123".to_string(), "client-id".to_string());
//! let connector = CognitoConnector::new(Arc::new(MemoryTokenStore::new()));
//! let manager = SessionManager::new(pool, Arc::new(connector));
//!
//! manager.initialize().await;
//! if !manager.is_authenticated() {
//!     let _ = manager.login("a@b.com", "secret").await;
//! }
//! let _bearer = manager.token();
//! # }
//! ```

pub mod cognito;
pub mod config;
pub mod error;
pub mod manager;
pub mod provider;
pub mod role;
pub mod session;
pub mod token;

// Re-export main types at crate root
pub use cognito::{
    CognitoConnector, CognitoProvider, FileTokenStore, MemoryTokenStore, StoredTokens, TokenStore,
};
pub use config::UserPoolConfig;
pub use error::{AuthFailureKind, ProviderError, SessionError};
pub use manager::{AuthState, SessionManager};
pub use provider::{AuthOutcome, IdentityProvider, ProviderConnector, ProviderSession, UserAttribute};
pub use role::Role;
pub use session::{Session, SessionTokens};
pub use token::IdToken;

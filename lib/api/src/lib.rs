//! Authenticated client for the bpm-dashboard backend API.
//!
//! This crate provides:
//! - `ApiClient`: bearer-token injection, 401 detection and a bounded
//!   request timeout around the backend's GET endpoints
//! - `ApiGateway`: the slot the application installs its client into
//! - `AuthEvent`: the signal raised when the backend rejects a token
//!
//! The client does not know where tokens come from. It asks a
//! [`TokenSource`] on every request; any `Fn() -> Option<String>` works.

pub mod client;
pub mod error;
pub mod events;
pub mod gateway;
pub mod query;
pub mod token;

// Re-export main types at crate root
pub use client::{ApiClient, ApiConfig, DEFAULT_TIMEOUT};
pub use error::ApiError;
pub use events::AuthEvent;
pub use gateway::ApiGateway;
pub use query::HistoryQuery;
pub use token::{NoToken, TokenSource};

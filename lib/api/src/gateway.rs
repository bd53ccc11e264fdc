//! The application-held API client slot.
//!
//! The application creates an empty gateway at startup and installs a
//! client once the Session Manager has finished initializing. Calls made
//! before that fail with [`ApiError::ClientNotInitialized`].

use bpm_dashboard_core::{Result, StatisticsPeriod};
use serde_json::Value as JsonValue;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::query::HistoryQuery;

/// Holds the installed [`ApiClient`], if any.
#[derive(Default)]
pub struct ApiGateway {
    client: RwLock<Option<Arc<ApiClient>>>,
}

impl ApiGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `client`, replacing any previously installed one.
    pub fn install(&self, client: ApiClient) -> Arc<ApiClient> {
        let client = Arc::new(client);
        info!(base_url = %client.base_url(), "installed API client");
        *self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(client.clone());
        client
    }

    /// Returns true once a client has been installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns the installed client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientNotInitialized`] before `install`.
    pub fn client(&self) -> Result<Arc<ApiClient>, ApiError> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ApiError::ClientNotInitialized.into())
    }

    /// Latest measurement, from `/bpm/current`.
    pub async fn current_status(&self) -> Result<JsonValue, ApiError> {
        self.client()?.current_status().await
    }

    /// Past measurements matching `query`, from `/bpm/history`.
    pub async fn bpm_history(&self, query: &HistoryQuery) -> Result<JsonValue, ApiError> {
        self.client()?.bpm_history(query).await
    }

    /// Aggregates over `period`, from `/bpm/statistics`.
    pub async fn bpm_statistics(&self, period: StatisticsPeriod) -> Result<JsonValue, ApiError> {
        self.client()?.bpm_statistics(period).await
    }

    /// Registered devices, from `/devices`.
    pub async fn devices(&self) -> Result<JsonValue, ApiError> {
        self.client()?.devices().await
    }

    /// The backend's view of the signed-in user, from `/user/profile`.
    pub async fn user_profile(&self) -> Result<JsonValue, ApiError> {
        self.client()?.user_profile().await
    }

    /// Backend health, from `/health`.
    pub async fn health(&self) -> Result<JsonValue, ApiError> {
        self.client()?.health().await
    }
}

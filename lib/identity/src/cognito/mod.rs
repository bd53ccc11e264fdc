//! Cognito user pool provider.
//!
//! Speaks the user pool's JSON RPC directly over HTTPS. Tokens are kept in a
//! [`TokenStore`] so a later process can restore the session; expired ID
//! tokens are refreshed here, during session retrieval, and nowhere else.

mod store;
mod wire;

pub use store::{FileTokenStore, MemoryTokenStore, StoredTokens, TOKEN_FILE_NAME, TokenStore};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rootcause::prelude::Report;
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::UserPoolConfig;
use crate::error::ProviderError;
use crate::provider::{
    AuthOutcome, IdentityProvider, ProviderConnector, ProviderSession, UserAttribute,
};
use crate::token::IdToken;
use wire::{
    AccessTokenRequest, Action, AuthenticationResult, CONTENT_TYPE, ErrorBody,
    GetUserResponse, InitiateAuthRequest, InitiateAuthResponse, NEW_PASSWORD_REQUIRED,
};

/// Default timeout for calls to the user pool.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// ID tokens expiring within this window are refreshed before use.
pub const REFRESH_SKEW_SECS: i64 = 60;

/// Builds [`CognitoProvider`] handles sharing one token store.
pub struct CognitoConnector {
    store: Arc<dyn TokenStore>,
    endpoint: Option<String>,
    timeout: Duration,
}

impl CognitoConnector {
    /// Creates a connector persisting tokens in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            endpoint: None,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Overrides the RPC endpoint derived from the pool's region.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ProviderConnector for CognitoConnector {
    fn connect(
        &self,
        pool: &UserPoolConfig,
    ) -> Result<Arc<dyn IdentityProvider>, Report<ProviderError>> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProviderError::Unreachable {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let endpoint = self.endpoint.clone().unwrap_or_else(|| pool.endpoint());
        info!(
            user_pool_id = %pool.user_pool_id(),
            endpoint = %endpoint,
            "connected identity provider"
        );

        Ok(Arc::new(CognitoProvider {
            http,
            endpoint,
            client_id: pool.client_id().to_string(),
            store: self.store.clone(),
        }))
    }
}

/// Identity provider backed by a Cognito user pool.
pub struct CognitoProvider {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
    store: Arc<dyn TokenStore>,
}

impl CognitoProvider {
    async fn call<Req, Resp>(
        &self,
        action: Action,
        request: &Req,
    ) -> Result<Resp, Report<ProviderError>>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let body = serde_json::to_vec(request).map_err(|e| ProviderError::UnexpectedResponse {
            reason: format!("failed to encode {} request: {e}", action.as_str()),
        })?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", action.target())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                debug!(error = %e, action = action.as_str(), "identity provider request failed");
                ProviderError::Unreachable {
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorBody>(&text) {
                Ok(error) => ProviderError::Service {
                    code: error.code().to_string(),
                    message: error.message,
                },
                Err(_) => ProviderError::UnexpectedResponse {
                    reason: format!("{} returned HTTP {status}", action.as_str()),
                },
            }
            .into());
        }

        response.json::<Resp>().await.map_err(|e| {
            ProviderError::UnexpectedResponse {
                reason: format!("failed to decode {} response: {e}", action.as_str()),
            }
            .into()
        })
    }

    async fn persist(&self, username: &str, session: &ProviderSession) {
        if let Err(report) = self.store.save(username, StoredTokens::from(session)).await {
            warn!(error = %report, %username, "failed to persist tokens");
        }
    }

    async fn refresh(
        &self,
        username: &str,
        stale: &ProviderSession,
    ) -> Result<ProviderSession, Report<ProviderError>> {
        let response: InitiateAuthResponse = self
            .call(
                Action::InitiateAuth,
                &InitiateAuthRequest::refresh(&self.client_id, stale.refresh_token()),
            )
            .await?;

        let result = response
            .authentication_result
            .ok_or_else(|| ProviderError::UnexpectedResponse {
                reason: "refresh returned no tokens".to_string(),
            })?;
        let session = session_from_result(result, Some(stale.refresh_token()))?;

        debug!(%username, "refreshed tokens");
        self.persist(username, &session).await;
        Ok(session)
    }
}

fn session_from_result(
    result: AuthenticationResult,
    previous_refresh_token: Option<&str>,
) -> Result<ProviderSession, Report<ProviderError>> {
    let refresh_token = result
        .refresh_token
        .or_else(|| previous_refresh_token.map(ToString::to_string))
        .ok_or_else(|| ProviderError::UnexpectedResponse {
            reason: "authentication result has no refresh token".to_string(),
        })?;
    Ok(ProviderSession::new(
        IdToken::new(result.id_token),
        result.access_token,
        refresh_token,
    ))
}

#[async_trait]
impl IdentityProvider for CognitoProvider {
    async fn current_user(&self) -> Option<String> {
        match self.store.last_user().await {
            Ok(user) => user,
            Err(report) => {
                warn!(error = %report, "failed to read token store");
                None
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_session(&self, username: &str) -> Result<ProviderSession, Report<ProviderError>> {
        let stored = self
            .store
            .load(username)
            .await?
            .ok_or_else(|| ProviderError::NoStoredSession {
                username: username.to_string(),
            })?;
        let session = stored.to_session();

        if session
            .id_token()
            .expires_within(Utc::now(), ChronoDuration::seconds(REFRESH_SKEW_SECS))
        {
            return self.refresh(username, &session).await;
        }
        Ok(session)
    }

    #[instrument(skip(self, session))]
    async fn user_attributes(
        &self,
        username: &str,
        session: &ProviderSession,
    ) -> Result<Vec<UserAttribute>, Report<ProviderError>> {
        let response: GetUserResponse = self
            .call(
                Action::GetUser,
                &AccessTokenRequest {
                    access_token: session.access_token(),
                },
            )
            .await?;
        Ok(response.user_attributes)
    }

    #[instrument(skip(self, secret))]
    async fn authenticate(&self, identifier: &str, secret: &str) -> AuthOutcome {
        let response: InitiateAuthResponse = match self
            .call(
                Action::InitiateAuth,
                &InitiateAuthRequest::password(&self.client_id, identifier, secret),
            )
            .await
        {
            Ok(response) => response,
            Err(report) => return AuthOutcome::Failure(report),
        };

        if response.challenge_name.as_deref() == Some(NEW_PASSWORD_REQUIRED) {
            return AuthOutcome::NewCredentialRequired(response.challenge_attributes());
        }

        let Some(result) = response.authentication_result else {
            let challenge = response.challenge_name.unwrap_or_default();
            return AuthOutcome::Failure(
                ProviderError::UnexpectedResponse {
                    reason: format!("unsupported challenge '{challenge}'"),
                }
                .into(),
            );
        };

        match session_from_result(result, None) {
            Ok(session) => {
                self.persist(identifier, &session).await;
                AuthOutcome::Success(session)
            }
            Err(report) => AuthOutcome::Failure(report),
        }
    }

    #[instrument(skip(self))]
    async fn sign_out(&self, username: &str) {
        match self.store.load(username).await {
            Ok(Some(tokens)) => {
                let result: Result<IgnoredAny, _> = self
                    .call(
                        Action::GlobalSignOut,
                        &AccessTokenRequest {
                            access_token: &tokens.access_token,
                        },
                    )
                    .await;
                if let Err(report) = result {
                    debug!(error = %report, "global sign-out failed; clearing local tokens anyway");
                }
            }
            Ok(None) => {}
            Err(report) => warn!(error = %report, "failed to read token store"),
        }

        if let Err(report) = self.store.clear(username).await {
            warn!(error = %report, "failed to clear stored tokens");
        }
    }
}

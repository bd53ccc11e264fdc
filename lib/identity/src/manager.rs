//! The Session Manager.
//!
//! Owns the authenticated-user lifecycle:
//!
//! ```text
//! Uninitialized -> Restoring -> Authenticated | Unauthenticated
//! Authenticated --logout--> Unauthenticated
//! Unauthenticated --login--> Authenticated
//! ```
//!
//! The current state is published on a `watch` channel. Only the manager's
//! own operations write it; everything else reads it through
//! [`SessionManager::token`], [`SessionManager::state`] or a subscription.

use rootcause::prelude::Report;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::config::UserPoolConfig;
use crate::error::{ProviderError, SessionError};
use crate::provider::{AuthOutcome, IdentityProvider, ProviderConnector, ProviderSession};
use crate::session::Session;

/// Lifecycle state of a [`SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// The identity provider has not been contacted yet.
    Uninitialized,
    /// Silent restoration of a persisted session is in flight.
    Restoring,
    /// A session is held.
    Authenticated(Arc<Session>),
    /// No session is held.
    Unauthenticated,
}

impl AuthState {
    /// Returns the held session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Arc<Session>> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// Returns true if a session is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Owns the current session and its transitions.
pub struct SessionManager {
    pool: UserPoolConfig,
    connector: Arc<dyn ProviderConnector>,
    provider: OnceLock<Arc<dyn IdentityProvider>>,
    state: watch::Sender<AuthState>,
}

impl SessionManager {
    /// Creates a manager in the `Uninitialized` state.
    #[must_use]
    pub fn new(pool: UserPoolConfig, connector: Arc<dyn ProviderConnector>) -> Self {
        Self {
            pool,
            connector,
            provider: OnceLock::new(),
            state: watch::Sender::new(AuthState::Uninitialized),
        }
    }

    /// Restores a persisted session, if the provider holds a valid one.
    ///
    /// Never fails: provider errors are logged and leave the manager
    /// `Unauthenticated`, so the caller can always fall through to a login
    /// prompt.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> AuthState {
        self.transition(AuthState::Restoring);

        let next = match self.restore().await {
            Ok(Some(session)) => {
                info!(username = %session.username(), "restored session");
                AuthState::Authenticated(Arc::new(session))
            }
            Ok(None) => AuthState::Unauthenticated,
            Err(report) => {
                warn!(error = %report, "session restoration failed");
                AuthState::Unauthenticated
            }
        };

        self.transition(next.clone());
        next
    }

    /// Authenticates interactively and stores the resulting session.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotInitialized`] if `initialize` has not produced a
    ///   provider handle.
    /// - [`SessionError::CredentialChangeRequired`] if the provider demands
    ///   a new credential first.
    /// - [`SessionError::Authentication`] for any other provider failure.
    ///
    /// The state is unchanged on every error.
    #[instrument(skip(self, secret))]
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<Arc<Session>, Report<SessionError>> {
        let provider = self
            .provider
            .get()
            .cloned()
            .ok_or(SessionError::NotInitialized)?;

        let provider_session = match provider.authenticate(identifier, secret).await {
            AuthOutcome::Success(session) => session,
            AuthOutcome::NewCredentialRequired(attributes) => {
                info!("provider requires a credential change");
                return Err(SessionError::CredentialChangeRequired { attributes }.into());
            }
            AuthOutcome::Failure(report) => {
                debug!(code = %report.current_context().code(), "authentication rejected");
                let context = SessionError::authentication(report.current_context());
                return Err(report.context(context));
            }
        };

        let session = match Self::extract(provider.as_ref(), identifier, &provider_session).await
        {
            Ok(session) => Arc::new(session),
            Err(report) => {
                warn!(error = %report, "claim extraction failed after login");
                let context = SessionError::authentication(report.current_context());
                return Err(report.context(context));
            }
        };

        info!(username = %session.username(), role = %session.role(), "logged in");
        self.transition(AuthState::Authenticated(session.clone()));
        Ok(session)
    }

    /// Ends the provider session, if any, and clears the held session.
    ///
    /// Safe to call in any state; always ends `Unauthenticated`.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Some(provider) = self.provider.get()
            && let Some(username) = provider.current_user().await
        {
            provider.sign_out(&username).await;
            debug!(%username, "signed out at provider");
        }
        self.transition(AuthState::Unauthenticated);
    }

    /// Returns the ID token of the current session.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state
            .borrow()
            .session()
            .map(|session| session.tokens().id_token().to_string())
    }

    /// Returns the current session.
    #[must_use]
    pub fn session(&self) -> Option<Arc<Session>> {
        self.state.borrow().session().cloned()
    }

    /// Returns true if a session is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Subscribes to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Returns true if `initialize` built a provider handle.
    #[must_use]
    pub fn has_provider(&self) -> bool {
        self.provider.get().is_some()
    }

    async fn restore(&self) -> Result<Option<Session>, Report<ProviderError>> {
        let Some(provider) = self.provider_handle()? else {
            debug!("user pool not configured; skipping restoration");
            return Ok(None);
        };

        let Some(username) = provider.current_user().await else {
            debug!("no current user at provider");
            return Ok(None);
        };

        let provider_session = provider.get_session(&username).await?;
        if !provider_session.is_valid() {
            debug!(%username, "provider session is no longer valid");
            return Ok(None);
        }

        Self::extract(provider.as_ref(), &username, &provider_session)
            .await
            .map(Some)
    }

    fn provider_handle(
        &self,
    ) -> Result<Option<Arc<dyn IdentityProvider>>, Report<ProviderError>> {
        if let Some(provider) = self.provider.get() {
            return Ok(Some(provider.clone()));
        }
        if !self.pool.is_configured() {
            return Ok(None);
        }
        let provider = self.connector.connect(&self.pool)?;
        Ok(Some(self.provider.get_or_init(|| provider).clone()))
    }

    async fn extract(
        provider: &dyn IdentityProvider,
        username: &str,
        provider_session: &ProviderSession,
    ) -> Result<Session, Report<ProviderError>> {
        let attributes = provider
            .user_attributes(username, provider_session)
            .await?;
        Session::from_provider(username, provider_session, &attributes)
    }

    fn transition(&self, next: AuthState) {
        let previous = self.state.send_replace(next);
        debug!(
            from = state_name(&previous),
            to = state_name(&self.state.borrow()),
            "session state transition"
        );
    }
}

fn state_name(state: &AuthState) -> &'static str {
    match state {
        AuthState::Uninitialized => "uninitialized",
        AuthState::Restoring => "restoring",
        AuthState::Authenticated(_) => "authenticated",
        AuthState::Unauthenticated => "unauthenticated",
    }
}

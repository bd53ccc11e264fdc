//! Application wiring.
//!
//! Startup order matters: the Session Manager must finish `initialize`
//! before the API client exists, so the first request already sees a
//! restored token.

use bpm_dashboard_api::{ApiClient, ApiConfig, ApiGateway, AuthEvent};
use bpm_dashboard_identity::{
    AuthFailureKind, CognitoConnector, FileTokenStore, ProviderConnector, Session, SessionError,
    SessionManager,
};
use rootcause::prelude::Report;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::{RuntimeConfig, Settings, load_runtime_config};
use crate::error::AppError;

/// Login attempts made per prompt before giving up.
pub const MAX_LOGIN_ATTEMPTS: usize = 3;

/// Credentials entered by the user.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Source of interactive credentials.
///
/// Implementations may block; they are always called from a blocking task.
pub trait LoginPrompt: Send + Sync {
    /// Asks for credentials. `None` means the user declined.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Prompt`] if input cannot be read.
    fn credentials(&self, reason: &str) -> Result<Option<Credentials>, Report<AppError>>;

    /// Shows a message to the user.
    fn notify(&self, message: &str);
}

/// Terminal prompt backed by `dialoguer`.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    email: Option<String>,
}

impl TerminalPrompt {
    /// Creates a prompt, optionally with the email already known.
    #[must_use]
    pub fn new(email: Option<String>) -> Self {
        Self { email }
    }
}

impl LoginPrompt for TerminalPrompt {
    fn credentials(&self, reason: &str) -> Result<Option<Credentials>, Report<AppError>> {
        eprintln!("{reason}");

        let email = match &self.email {
            Some(email) => email.clone(),
            None => dialoguer::Input::<String>::new()
                .with_prompt("Email")
                .allow_empty(true)
                .interact_text()
                .map_err(|e| AppError::Prompt {
                    details: e.to_string(),
                })?,
        };
        if email.trim().is_empty() {
            return Ok(None);
        }

        let password = dialoguer::Password::new()
            .with_prompt("Password")
            .interact()
            .map_err(|e| AppError::Prompt {
                details: e.to_string(),
            })?;

        Ok(Some(Credentials {
            email: email.trim().to_string(),
            password,
        }))
    }

    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Prompts for credentials and logs in, retrying on rejected credentials.
///
/// Only a wrong password or an unknown email is worth another prompt; any
/// other failure ends the attempt.
///
/// # Errors
///
/// Returns [`AppError::LoginFailed`] when the user declines, a credential
/// change is required, or every attempt is rejected.
pub async fn interactive_login(
    sessions: &SessionManager,
    prompt: Arc<dyn LoginPrompt>,
    reason: &str,
) -> Result<Arc<Session>, Report<AppError>> {
    let mut last_failure = String::from("no attempt made");

    for attempt in 1..=MAX_LOGIN_ATTEMPTS {
        let asking = prompt.clone();
        let reason = reason.to_string();
        let credentials = tokio::task::spawn_blocking(move || asking.credentials(&reason))
            .await
            .map_err(|e| AppError::Prompt {
                details: e.to_string(),
            })??;

        let Some(credentials) = credentials else {
            return Err(AppError::LoginFailed {
                details: "login cancelled".to_string(),
            }
            .into());
        };

        match sessions.login(&credentials.email, &credentials.password).await {
            Ok(session) => {
                prompt.notify(&format!(
                    "Signed in as {} ({})",
                    session.email(),
                    session.role().label()
                ));
                return Ok(session);
            }
            Err(report) => {
                let error = report.current_context();
                debug!(attempt, error = %error, "login attempt failed");
                prompt.notify(&error.user_message());
                last_failure = error.to_string();
                if !is_retryable(error) {
                    break;
                }
            }
        }
    }

    Err(AppError::LoginFailed {
        details: last_failure,
    }
    .into())
}

fn is_retryable(error: &SessionError) -> bool {
    matches!(
        error,
        SessionError::Authentication {
            kind: AuthFailureKind::InvalidCredentials | AuthFailureKind::UserNotFound,
            ..
        }
    )
}

/// Background task routing expired-session signals to the login prompt.
pub struct ExpiryListener {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ExpiryListener {
    /// Spawns the listener.
    #[must_use]
    pub fn spawn(
        sessions: Arc<SessionManager>,
        mut events: broadcast::Receiver<AuthEvent>,
        prompt: Arc<dyn LoginPrompt>,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            loop {
                // Pending events are handled before shutdown is honoured.
                let event = tokio::select! {
                    biased;
                    event = events.recv() => event,
                    _ = &mut shutdown_rx => break,
                };

                match event {
                    Ok(AuthEvent::Expired) => {
                        info!("session expired; prompting for login");
                        if let Err(report) = interactive_login(
                            &sessions,
                            prompt.clone(),
                            "Your session has expired. Please sign in again.",
                        )
                        .await
                        {
                            warn!(error = %report, "re-authentication failed");
                        }
                        // Concurrent requests fail together; one prompt covers them all.
                        let coalesced = drain(&mut events);
                        if coalesced > 0 {
                            debug!(coalesced, "dropped expiry events raised while prompting");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "expiry listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("expiry listener stopped");
        });

        Self { shutdown, handle }
    }

    /// Handles already-queued events, then stops the listener.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            warn!(error = %e, "expiry listener panicked");
        }
    }
}

fn drain(events: &mut broadcast::Receiver<AuthEvent>) -> usize {
    let mut drained: usize = 0;
    loop {
        match events.try_recv() {
            Ok(_) => drained += 1,
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                drained = drained.saturating_add(usize::try_from(skipped).unwrap_or(usize::MAX));
            }
            Err(_) => return drained,
        }
    }
}

/// The wired application.
pub struct App {
    settings: Settings,
    runtime: RuntimeConfig,
    sessions: Arc<SessionManager>,
    gateway: Arc<ApiGateway>,
}

impl App {
    /// Loads configuration and wires the Session Manager, API client and
    /// gateway using the Cognito provider with file token storage.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Startup`] if the API client cannot be built.
    pub async fn start(settings: Settings) -> Result<Self, Report<AppError>> {
        let runtime = load_runtime_config(&settings).await;
        let store = Arc::new(FileTokenStore::new(settings.token_dir()));
        let connector = Arc::new(CognitoConnector::new(store).with_timeout(settings.request_timeout()));
        Self::start_with(settings, runtime, connector).await
    }

    /// Wires the application around an explicit provider connector.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Startup`] if the API client cannot be built.
    #[instrument(skip_all, fields(api_url = %runtime.api_url))]
    pub async fn start_with(
        settings: Settings,
        runtime: RuntimeConfig,
        connector: Arc<dyn ProviderConnector>,
    ) -> Result<Self, Report<AppError>> {
        let sessions = Arc::new(SessionManager::new(runtime.user_pool(), connector));
        let state = sessions.initialize().await;
        debug!(authenticated = state.is_authenticated(), "session manager initialized");

        let token_source = sessions.clone();
        let client = ApiClient::new(
            ApiConfig::new(runtime.api_url.clone()).with_timeout(settings.request_timeout()),
            Arc::new(move || token_source.token()),
        )
        .map_err(|report| AppError::Startup {
            details: report.to_string(),
        })?;

        let gateway = Arc::new(ApiGateway::new());
        gateway.install(client);

        Ok(Self {
            settings,
            runtime,
            sessions,
            gateway,
        })
    }

    /// Spawns the expiry listener on the installed client's event channel.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Startup`] if no client is installed.
    pub fn listen_for_expiry(
        &self,
        prompt: Arc<dyn LoginPrompt>,
    ) -> Result<ExpiryListener, Report<AppError>> {
        let client = self.gateway.client().map_err(|report| AppError::Startup {
            details: report.to_string(),
        })?;
        Ok(ExpiryListener::spawn(
            self.sessions.clone(),
            client.subscribe(),
            prompt,
        ))
    }

    /// Local settings read at startup.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runtime configuration as fetched, or the local fallback.
    #[must_use]
    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// The session manager shared with the expiry listener.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// The installed API gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<ApiGateway> {
        &self.gateway
    }
}

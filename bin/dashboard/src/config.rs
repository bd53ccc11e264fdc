//! Dashboard configuration.
//!
//! Two layers:
//! - [`Settings`]: local settings, loaded via the `config` crate from
//!   `BPM_DASHBOARD__*` environment variables.
//! - [`RuntimeConfig`]: the deployment's endpoints and user pool, fetched
//!   once at startup from `config_url`. When that fetch fails the runtime
//!   configuration is built from the local settings instead.

use bpm_dashboard_identity::UserPoolConfig;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ConfigError;

/// Prefix of the environment variables read into [`Settings`].
pub const ENV_PREFIX: &str = "BPM_DASHBOARD";

/// Directory name used for token storage under the home directory.
const TOKEN_DIR_NAME: &str = ".bpm-dashboard";

/// Local settings for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// URL of the runtime configuration document.
    #[serde(default)]
    pub config_url: Option<String>,

    /// Directory holding persisted tokens.
    #[serde(default)]
    pub token_dir: Option<PathBuf>,

    /// Timeout for backend requests, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Refresh interval of the `watch` view, in seconds.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Fallback backend URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Fallback user pool ID.
    #[serde(default)]
    pub cognito_user_pool_id: String,

    /// Fallback app client ID.
    #[serde(default)]
    pub cognito_client_id: String,

    /// Fallback hosted UI domain.
    #[serde(default)]
    pub cognito_domain: String,

    /// Fallback region.
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_refresh_interval_secs() -> u64 {
    10
}

fn default_api_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_url: None,
            token_dir: None,
            request_timeout_secs: default_request_timeout_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            api_url: default_api_url(),
            cognito_user_pool_id: String::new(),
            cognito_client_id: String::new(),
            cognito_domain: String::new(),
            region: default_region(),
        }
    }
}

impl Settings {
    /// Loads settings from `BPM_DASHBOARD__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a value of the wrong type.
    pub fn from_env() -> Result<Self, Report<ConfigError>> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: config::Environment) -> Result<Self, Report<ConfigError>> {
        let settings = config::Config::builder()
            .add_source(
                environment
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(ConfigError::from)?
            .try_deserialize()
            .map_err(ConfigError::from)?;
        Ok(settings)
    }

    /// Returns the token directory, defaulting to `~/.bpm-dashboard`.
    #[must_use]
    pub fn token_dir(&self) -> PathBuf {
        if let Some(dir) = &self.token_dir {
            return dir.clone();
        }
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(TOKEN_DIR_NAME)
    }

    /// Returns the backend request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the refresh interval of the `watch` view.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// Builds the runtime configuration used when the document cannot be fetched.
    #[must_use]
    pub fn fallback_runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            api_url: self.api_url.clone(),
            cognito_user_pool_id: self.cognito_user_pool_id.clone(),
            cognito_client_id: self.cognito_client_id.clone(),
            cognito_domain: self.cognito_domain.clone(),
            region: self.region.clone(),
        }
    }
}

/// Deployment configuration published alongside the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// Base URL of the backend API.
    pub api_url: String,
    /// User pool ID; empty disables sign-in.
    pub cognito_user_pool_id: String,
    /// App client ID; empty disables sign-in.
    pub cognito_client_id: String,
    /// Hosted UI domain. Not used by this client.
    pub cognito_domain: String,
    /// Region of the user pool.
    pub region: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Settings::default().fallback_runtime()
    }
}

impl RuntimeConfig {
    /// Returns the user pool configuration.
    ///
    /// The region comes from the pool ID when it carries one.
    #[must_use]
    pub fn user_pool(&self) -> UserPoolConfig {
        let pool = UserPoolConfig::new(
            self.cognito_user_pool_id.clone(),
            self.cognito_client_id.clone(),
        );
        if pool.region().is_empty() {
            pool.with_region(self.region.clone())
        } else {
            pool
        }
    }
}

/// Fetches the runtime configuration document.
///
/// # Errors
///
/// Returns [`ConfigError::Fetch`] if the document is unreachable, answers
/// with a non-success status, or is not valid JSON.
pub async fn fetch_runtime_config(
    url: &str,
    timeout: Duration,
) -> Result<RuntimeConfig, Report<ConfigError>> {
    let fetch_error = |reason: String| ConfigError::Fetch {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| fetch_error(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    if !response.status().is_success() {
        return Err(fetch_error(format!("HTTP {}", response.status())).into());
    }

    let runtime = response
        .json::<RuntimeConfig>()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;
    Ok(runtime)
}

/// Loads the runtime configuration, falling back to local settings.
///
/// Never fails: a missing or broken document is logged and replaced by
/// [`Settings::fallback_runtime`].
pub async fn load_runtime_config(settings: &Settings) -> RuntimeConfig {
    let Some(url) = settings.config_url.as_deref().filter(|url| !url.is_empty()) else {
        debug!("no config_url set; using local runtime configuration");
        return settings.fallback_runtime();
    };

    match fetch_runtime_config(url, settings.request_timeout()).await {
        Ok(runtime) => {
            info!(%url, api_url = %runtime.api_url, "loaded runtime configuration");
            runtime
        }
        Err(report) => {
            warn!(error = %report, "using local runtime configuration");
            settings.fallback_runtime()
        }
    }
}

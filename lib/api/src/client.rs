//! HTTP client for the backend REST API.
//!
//! Every request carries the current bearer token when one is available.
//! A 401 answer publishes [`AuthEvent::Expired`] and fails the call; the
//! client never retries or refreshes on its own.

use bpm_dashboard_core::{Result, StatisticsPeriod};
use reqwest::{StatusCode, Url, header};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use crate::error::ApiError;
use crate::events::{AuthEvent, EVENT_CAPACITY};
use crate::query::HistoryQuery;
use crate::token::TokenSource;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL of the backend, e.g. `https://api.example.com/prod`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ApiConfig {
    /// Creates a configuration with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Authenticated client for the backend API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
    events: broadcast::Sender<AuthEvent>,
}

impl ApiClient {
    /// Creates a client for `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if the base URL does not parse, or
    /// [`ApiError::Connection`] if the HTTP client cannot be built.
    pub fn new(config: ApiConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, ApiError> {
        Url::parse(&config.base_url).map_err(|e| ApiError::InvalidUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| ApiError::Connection {
                path: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            events,
        })
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Subscribes to authentication events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Fetches the latest measurement.
    pub async fn current_status(&self) -> Result<JsonValue, ApiError> {
        self.get("/bpm/current", &[]).await
    }

    /// Fetches measurement history.
    pub async fn bpm_history(&self, query: &HistoryQuery) -> Result<JsonValue, ApiError> {
        self.get("/bpm/history", &query.to_pairs()).await
    }

    /// Fetches aggregate statistics for `period`.
    pub async fn bpm_statistics(&self, period: StatisticsPeriod) -> Result<JsonValue, ApiError> {
        self.get("/bpm/statistics", &[("period", period.as_str().to_string())])
            .await
    }

    /// Fetches the user's devices.
    pub async fn devices(&self) -> Result<JsonValue, ApiError> {
        self.get("/devices", &[]).await
    }

    /// Fetches the user's profile.
    pub async fn user_profile(&self) -> Result<JsonValue, ApiError> {
        self.get("/user/profile", &[]).await
    }

    /// Checks backend health.
    pub async fn health(&self) -> Result<JsonValue, ApiError> {
        self.get("/health", &[]).await
    }

    #[instrument(skip(self, query))]
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<JsonValue, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.tokens.token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(path, "request timed out");
                ApiError::Timeout {
                    path: path.to_string(),
                }
            } else {
                warn!(error = %e, path, "request failed");
                ApiError::Connection {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "backend rejected credentials");
            // No receivers is fine: nobody is waiting to re-authenticate.
            let _ = self.events.send(AuthEvent::Expired);
            return Err(ApiError::Unauthorized {
                path: path.to_string(),
            }
            .into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(path, status = %status, "backend returned error status");
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    path: path.to_string(),
                }
            } else {
                ApiError::Connection {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;
        if bytes.is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::Decode {
                path: path.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::token::NoToken;
    use axum::Router;
    use axum::extract::{RawQuery, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What the fake backend saw.
    #[derive(Default)]
    pub(crate) struct Backend {
        pub hits: AtomicUsize,
        pub authorization: Mutex<Vec<Option<String>>>,
        pub queries: Mutex<Vec<Option<String>>>,
    }

    impl Backend {
        fn record(&self, headers: &HeaderMap, query: Option<String>) {
            self.hits.fetch_add(1, Ordering::SeqCst);
            self.authorization.lock().unwrap().push(
                headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(ToString::to_string),
            );
            self.queries.lock().unwrap().push(query);
        }
    }

    async fn current(
        State(backend): State<Arc<Backend>>,
        headers: HeaderMap,
        RawQuery(query): RawQuery,
    ) -> Response {
        backend.record(&headers, query);
        axum::Json(json!({"bpm": 72, "device_id": "bpm-sensor-01"})).into_response()
    }

    async fn history(
        State(backend): State<Arc<Backend>>,
        headers: HeaderMap,
        RawQuery(query): RawQuery,
    ) -> Response {
        backend.record(&headers, query);
        axum::Json(json!({"data": [], "count": 0})).into_response()
    }

    async fn statistics(
        State(backend): State<Arc<Backend>>,
        headers: HeaderMap,
        RawQuery(query): RawQuery,
    ) -> Response {
        backend.record(&headers, query);
        axum::Json(json!({"avg": 70, "min": 60, "max": 80})).into_response()
    }

    async fn expired(
        State(backend): State<Arc<Backend>>,
        headers: HeaderMap,
        RawQuery(query): RawQuery,
    ) -> Response {
        backend.record(&headers, query);
        (AxumStatus::UNAUTHORIZED, axum::Json(json!({"message": "Unauthorized"}))).into_response()
    }

    async fn failing(
        State(backend): State<Arc<Backend>>,
        headers: HeaderMap,
        RawQuery(query): RawQuery,
    ) -> Response {
        backend.record(&headers, query);
        (AxumStatus::INTERNAL_SERVER_ERROR, "boom").into_response()
    }

    async fn slow(
        State(backend): State<Arc<Backend>>,
        headers: HeaderMap,
        RawQuery(query): RawQuery,
    ) -> Response {
        backend.record(&headers, query);
        tokio::time::sleep(Duration::from_secs(5)).await;
        axum::Json(json!({})).into_response()
    }

    async fn not_json(
        State(backend): State<Arc<Backend>>,
        headers: HeaderMap,
        RawQuery(query): RawQuery,
    ) -> Response {
        backend.record(&headers, query);
        "<html>gateway</html>".into_response()
    }

    /// Serves a fake backend and returns its base URL.
    ///
    /// `/devices` answers 401, `/user/profile` answers 500, `/health` sleeps
    /// and `/bpm/raw` answers with a non-JSON body.
    pub(crate) async fn spawn_backend(backend: Arc<Backend>) -> String {
        let app = Router::new()
            .route("/bpm/current", get(current))
            .route("/bpm/history", get(history))
            .route("/bpm/statistics", get(statistics))
            .route("/devices", get(expired))
            .route("/user/profile", get(failing))
            .route("/health", get(slow))
            .route("/bpm/raw", get(not_json))
            .with_state(backend);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{addr}")
    }

    fn client(base_url: &str, token: Option<&str>) -> ApiClient {
        let token = token.map(ToString::to_string);
        ApiClient::new(ApiConfig::new(base_url), Arc::new(move || token.clone())).expect("client")
    }

    #[tokio::test]
    async fn bearer_header_is_sent_when_token_present() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend.clone()).await;

        let body = client(&base, Some("id-token"))
            .current_status()
            .await
            .expect("status");

        assert_eq!(body, json!({"bpm": 72, "device_id": "bpm-sensor-01"}));
        assert_eq!(
            backend.authorization.lock().unwrap().as_slice(),
            [Some("Bearer id-token".to_string())]
        );
    }

    #[tokio::test]
    async fn request_is_unauthenticated_without_token() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend.clone()).await;

        client(&base, None).current_status().await.expect("status");

        assert_eq!(backend.authorization.lock().unwrap().as_slice(), [None]);
    }

    #[tokio::test]
    async fn token_is_read_per_request() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend.clone()).await;
        let current = Arc::new(Mutex::new(None::<String>));
        let reader = current.clone();
        let client = ApiClient::new(
            ApiConfig::new(&base),
            Arc::new(move || reader.lock().unwrap().clone()),
        )
        .expect("client");

        client.current_status().await.expect("status");
        *current.lock().unwrap() = Some("fresh".to_string());
        client.current_status().await.expect("status");

        assert_eq!(
            backend.authorization.lock().unwrap().as_slice(),
            [None, Some("Bearer fresh".to_string())]
        );
    }

    #[tokio::test]
    async fn statistics_period_is_sent_and_body_returned_unchanged() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend.clone()).await;

        let body = client(&base, Some("t"))
            .bpm_statistics(StatisticsPeriod::Week)
            .await
            .expect("stats");

        assert_eq!(body, json!({"avg": 70, "min": 60, "max": 80}));
        assert_eq!(
            backend.queries.lock().unwrap().as_slice(),
            [Some("period=week".to_string())]
        );
    }

    #[tokio::test]
    async fn history_query_is_encoded() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend.clone()).await;
        let query = HistoryQuery::new()
            .with_limit(50)
            .with_device("bpm sensor".into());

        client(&base, Some("t"))
            .bpm_history(&query)
            .await
            .expect("history");

        assert_eq!(
            backend.queries.lock().unwrap().as_slice(),
            [Some("limit=50&device_id=bpm+sensor".to_string())]
        );
    }

    #[tokio::test]
    async fn unfiltered_history_sends_no_query() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend.clone()).await;

        client(&base, Some("t"))
            .bpm_history(&HistoryQuery::new())
            .await
            .expect("history");

        assert_eq!(backend.queries.lock().unwrap().as_slice(), [None]);
    }

    #[tokio::test]
    async fn unauthorized_emits_one_expired_event_without_retry() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend.clone()).await;
        let client = client(&base, Some("stale"));
        let mut events = client.subscribe();

        let err = client.devices().await.unwrap_err();

        assert_eq!(
            err.current_context(),
            &ApiError::Unauthorized {
                path: "/devices".to_string()
            }
        );
        assert_eq!(events.try_recv(), Ok(AuthEvent::Expired));
        assert!(events.try_recv().is_err());
        assert_eq!(backend.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unauthorized_without_listeners_still_fails() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend.clone()).await;

        let err = client(&base, None).devices().await.unwrap_err();

        assert!(matches!(
            err.current_context(),
            ApiError::Unauthorized { .. }
        ));
    }

    #[tokio::test]
    async fn server_errors_keep_status_and_body() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend.clone()).await;
        let client = client(&base, Some("t"));
        let mut events = client.subscribe();

        let err = client.user_profile().await.unwrap_err();

        assert_eq!(
            err.current_context(),
            &ApiError::Status {
                path: "/user/profile".to_string(),
                status: 500,
                body: "boom".to_string(),
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend.clone()).await;
        let client = ApiClient::new(
            ApiConfig::new(&base).with_timeout(Duration::from_millis(200)),
            Arc::new(NoToken),
        )
        .expect("client");

        let err = client.health().await.unwrap_err();

        assert_eq!(
            err.current_context(),
            &ApiError::Timeout {
                path: "/health".to_string()
            }
        );
        assert_eq!(backend.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_json_body_is_a_decode_error() {
        let backend = Arc::new(Backend::default());
        let base = spawn_backend(backend).await;

        let err = client(&base, None).get("/bpm/raw", &[]).await.unwrap_err();

        assert!(matches!(err.current_context(), ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connection_error() {
        let err = client("http://127.0.0.1:9", None)
            .current_status()
            .await
            .unwrap_err();

        assert!(matches!(
            err.current_context(),
            ApiError::Connection { .. }
        ));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = ApiClient::new(ApiConfig::new("not a url"), Arc::new(NoToken));
        let Err(err) = result else {
            panic!("expected invalid URL");
        };
        assert!(matches!(
            err.current_context(),
            ApiError::InvalidUrl { .. }
        ));
    }

    #[test]
    fn default_timeout_is_thirty_seconds() {
        assert_eq!(ApiConfig::new("http://localhost").timeout, Duration::from_secs(30));
    }
}

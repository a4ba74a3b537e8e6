//! Main client implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use url::Url;

use crate::api::{EvaluateApi, HealthApi, SessionApi, StackStormApi};
use crate::error::{Error, ErrorResponse, Result};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Callback fired whenever the server rejects the session.
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// Orquestulator API client.
///
/// The client keeps the session cookie in its own cookie store, so every
/// clone shares one session.
///
/// # Example
///
/// ```no_run
/// use orquestulator_client::OrquestulatorClient;
///
/// # async fn example() -> orquestulator_client::Result<()> {
/// let client = OrquestulatorClient::builder()
///     .base_url("http://localhost:8000")
///     .build()?;
///
/// client.session().authenticate(Some("passphrase")).await?;
/// let result = client.evaluate().yaql("$.a", serde_json::json!({"a": 1})).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OrquestulatorClient {
    /// Inner shared state.
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    /// HTTP client.
    pub(crate) http: reqwest::Client,
    /// Base URL for API requests.
    pub(crate) base_url: Url,
    /// Request timeout.
    pub(crate) timeout: Duration,
    on_session_expired: Option<SessionExpiredHook>,
}

impl fmt::Debug for OrquestulatorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrquestulatorClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl OrquestulatorClient {
    /// Get access to the inner client state (for API implementations).
    pub(crate) fn inner(&self) -> &ClientInner {
        &self.inner
    }

    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client with default settings pointing to localhost.
    pub fn localhost() -> Result<Self> {
        Self::builder().base_url("http://127.0.0.1:8000").build()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the session API.
    pub fn session(&self) -> SessionApi {
        SessionApi::new(self.clone())
    }

    /// Access the evaluation API.
    pub fn evaluate(&self) -> EvaluateApi {
        EvaluateApi::new(self.clone())
    }

    /// Access the StackStorm API.
    pub fn stackstorm(&self) -> StackStormApi {
        StackStormApi::new(self.clone())
    }

    /// Access the health API.
    pub fn health(&self) -> HealthApi {
        HealthApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner
            .base_url
            .join(&format!("api/{}", path))
            .map_err(Error::from)
    }

    /// Make a GET request.
    pub(crate) async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .inner
            .http
            .get(url)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a POST request.
    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let response = self
            .inner
            .http
            .post(url)
            .json(body)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a POST request without a body.
    pub(crate) async fn post_empty<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .inner
            .http
            .post(url)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a PUT request.
    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let response = self
            .inner
            .http
            .put(url)
            .json(body)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Handle a response, extracting the body or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();

        if status == 401 {
            if let Some(hook) = &self.inner.on_session_expired {
                hook();
            }
        }

        match response.json::<ErrorResponse>().await {
            Ok(err) => match status {
                401 => Error::Auth(err.message),
                404 => Error::NotFound(err.message),
                _ => {
                    if let Some(query_type) = &err.query_type {
                        tracing::debug!(query_type = %query_type, "Evaluation rejected");
                    }
                    Error::Api {
                        status,
                        code: err.code,
                        message: err.message,
                    }
                }
            },
            Err(_) => Error::Api {
                status,
                code: "unknown".to_string(),
                message: format!("HTTP {}", status),
            },
        }
    }
}

/// Builder for creating an OrquestulatorClient.
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    on_session_expired: Option<SessionExpiredHook>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            on_session_expired: None,
        }
    }

    /// Set the base URL for the server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Call `hook` whenever the server answers 401, e.g. to route the user
    /// back to the login screen.
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<OrquestulatorClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("orquestulator-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(OrquestulatorClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
                on_session_expired: self.on_session_expired,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let result = ClientBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_normalizes_trailing_slash() {
        let client = ClientBuilder::new()
            .base_url("http://localhost:8000")
            .build()
            .unwrap();

        assert_eq!(client.base_url().as_str(), "http://localhost:8000/");
    }

    #[test]
    fn test_url_building() {
        let client = ClientBuilder::new()
            .base_url("http://localhost:8000/orq")
            .build()
            .unwrap();

        let url = client.url("session/data").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/orq/api/session/data");

        let url = client.url("/session/data").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/orq/api/session/data");
    }

    #[tokio::test]
    async fn test_session_expired_hook_fires_on_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/session/data"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"code": "unauthorized", "message": "Not authenticated"})),
            )
            .mount(&server)
            .await;

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let client = ClientBuilder::new()
            .base_url(server.uri())
            .on_session_expired(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let err = client.session().data().await.unwrap_err();
        assert!(err.is_auth_error());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_body_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/evaluate/yaql"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "evaluation_error",
                "message": "yaql syntax error: unexpected end of input",
                "query_type": "yaql"
            })))
            .mount(&server)
            .await;

        let client = ClientBuilder::new().base_url(server.uri()).build().unwrap();
        match client.evaluate().yaql("$.a +", json!({})).await {
            Err(Error::Api {
                status,
                code,
                message,
            }) => {
                assert_eq!(status, 400);
                assert_eq!(code, "evaluation_error");
                assert!(message.contains("syntax error"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ClientBuilder::new()
            .base_url(format!("http://{addr}"))
            .build()
            .unwrap();
        let err = client.session().status().await.unwrap_err();
        assert!(matches!(err, Error::Unreachable(_)), "{err:?}");
        assert!(err.is_network_error());
    }
}

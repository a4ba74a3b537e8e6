//! Minimal StackStorm REST client.

use std::fmt;
use std::time::Duration;

use orquestulator_config::StackStormSection;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Result, StackStormError};

/// Header StackStorm reads API keys from.
pub const API_KEY_HEADER: &str = "St2-Api-Key";

/// Page size used when listing executions.
pub const EXECUTION_LIST_LIMIT: usize = 50;

/// Longest upstream error body kept in [`StackStormError::Upstream`].
const MAX_ERROR_BODY: usize = 1024;

/// A resolved StackStorm endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub api_key: Option<String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    /// Check that requests can be built against this endpoint.
    pub fn validate(&self) -> Result<()> {
        self.api_url(&[]).map(drop)
    }

    /// `{url}/v1/{segments...}` with each segment percent-encoded.
    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url =
            Url::parse(self.url.trim()).map_err(|e| StackStormError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StackStormError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        url.path_segments_mut()
            .map_err(|_| StackStormError::InvalidUrl(self.url.clone()))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }
}

// API keys never end up in logs.
impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Timeouts and TLS behaviour for [`St2Client`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub test_timeout: Duration,
    pub request_timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&StackStormSection::default())
    }
}

impl From<&StackStormSection> for ClientOptions {
    fn from(section: &StackStormSection) -> Self {
        Self {
            test_timeout: section.test_timeout(),
            request_timeout: section.request_timeout(),
            accept_invalid_certs: section.accept_invalid_certs,
        }
    }
}

/// Shared HTTP client for every StackStorm endpoint.
#[derive(Clone)]
pub struct St2Client {
    http: reqwest::Client,
    options: ClientOptions,
}

impl St2Client {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .user_agent(format!("orquestulator/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StackStormError::Client(e.to_string()))?;
        Ok(Self { http, options })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Check that the endpoint answers an authenticated executions query.
    pub async fn probe(&self, endpoint: &Endpoint) -> Result<()> {
        let mut url = endpoint.api_url(&["executions"])?;
        url.query_pairs_mut().append_pair("limit", "1");
        self.send(endpoint, url, self.options.test_timeout, None)
            .await
            .map(drop)
    }

    /// Fetch one execution with secrets masked.
    pub async fn execution(&self, endpoint: &Endpoint, id: &str) -> Result<Value> {
        let mut url = endpoint.api_url(&["executions", id])?;
        url.query_pairs_mut().append_pair("show_secrets", "false");
        let not_found = format!("Execution {id} not found");
        let response = self
            .send(endpoint, url, self.options.request_timeout, Some(not_found))
            .await?;
        json(response).await
    }

    /// The most recent executions, newest first.
    pub async fn executions(&self, endpoint: &Endpoint, limit: usize) -> Result<Vec<Value>> {
        let mut url = endpoint.api_url(&["executions"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("show_secrets", "false");
        let response = self
            .send(endpoint, url, self.options.request_timeout, None)
            .await?;
        json(response).await
    }

    async fn send(
        &self,
        endpoint: &Endpoint,
        url: Url,
        timeout: Duration,
        not_found: Option<String>,
    ) -> Result<reqwest::Response> {
        debug!(url = %url, authenticated = endpoint.api_key.is_some(), "StackStorm request");

        let mut request = self.http.get(url.clone()).timeout(timeout);
        if let Some(key) = &endpoint.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        let response = request
            .send()
            .await
            .map_err(StackStormError::from_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        debug!(url = %url, status = status.as_u16(), "StackStorm request failed");

        Err(match status {
            StatusCode::UNAUTHORIZED => StackStormError::Unauthorized,
            StatusCode::FORBIDDEN => StackStormError::Forbidden,
            StatusCode::NOT_FOUND => StackStormError::NotFound(
                not_found.unwrap_or_else(|| format!("StackStorm resource not found: {}", url.path())),
            ),
            _ => {
                let mut body = response.text().await.unwrap_or_default();
                if body.len() > MAX_ERROR_BODY {
                    let mut cut = MAX_ERROR_BODY;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                StackStormError::Upstream {
                    status: status.as_u16(),
                    body,
                }
            }
        })
    }
}

async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| StackStormError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let endpoint = Endpoint::new("https://st2.example.com/api/", None);
        assert_eq!(
            endpoint.api_url(&["executions", "a/b"]).unwrap().as_str(),
            "https://st2.example.com/api/v1/executions/a%2Fb"
        );
        let endpoint = Endpoint::new("http://st2:9101", None);
        assert_eq!(
            endpoint.api_url(&["executions"]).unwrap().as_str(),
            "http://st2:9101/v1/executions"
        );
    }

    #[test]
    fn test_api_url_rejects_bad_urls() {
        assert!(Endpoint::new("not a url", None).api_url(&[]).is_err());
        assert!(Endpoint::new("ftp://st2", None).api_url(&[]).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let endpoint = Endpoint::new("http://st2", Some("secret".into()));
        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_empty_key_is_none() {
        assert_eq!(Endpoint::new("http://st2", Some(String::new())).api_key, None);
    }
}

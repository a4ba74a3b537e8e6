//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use wiremock::MockServer;

use orquestulator_config::{ConnectionsFile, RateLimit, RatePeriod, StackStormConnection};
use orquestulator_server::{AppState, Server, ServerConfig};
use orquestulator_session::{MemorySessionStore, StoreConfig};
use orquestulator_stackstorm::{ClientOptions, St2Client};

pub const PASSPHRASE: &str = "test-passphrase";

/// API key configured for the mock StackStorm connection.
pub const ST2_API_KEY: &str = "st2-test-key";

/// Options for [`TestServer::start_with`].
pub struct TestOptions {
    pub passphrase: Option<String>,
    pub session_ttl: Duration,
    pub auth_rate_limit: RateLimit,
    pub st2_timeout: Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            passphrase: Some(PASSPHRASE.to_string()),
            session_ttl: Duration::from_secs(3600),
            auth_rate_limit: RateLimit::new(1000, RatePeriod::Second),
            st2_timeout: Duration::from_secs(2),
        }
    }
}

/// A test server that runs in the background, with a mock StackStorm.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client with a cookie store, so it behaves like a browser.
    pub client: Client,
    /// Stands in for the StackStorm API.
    pub st2: MockServer,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with default configuration.
    pub async fn start() -> Result<Self> {
        Self::start_with(TestOptions::default()).await
    }

    pub async fn start_with(options: TestOptions) -> Result<Self> {
        let st2 = MockServer::start().await;

        let connections = ConnectionsFile {
            default: Some("mock".to_string()),
            connections: vec![
                StackStormConnection::new("mock", st2.uri())
                    .with_alias("Mock StackStorm")
                    .with_api_key(ST2_API_KEY),
                StackStormConnection::new("other", "http://127.0.0.1:9"),
            ],
        };

        let config = ServerConfig::new(options.passphrase)
            .with_auth_rate_limit(options.auth_rate_limit)
            .with_request_logging(false);

        let store = MemorySessionStore::new(StoreConfig::default().with_ttl(options.session_ttl));
        let st2_client = St2Client::new(ClientOptions {
            test_timeout: options.st2_timeout,
            request_timeout: options.st2_timeout,
            accept_invalid_certs: false,
        })?;
        let state = AppState::new(config, Arc::new(store), connections, st2_client);

        // Bind first so the port cannot be taken between lookup and serve.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let server = Server::from_state(state);
        let handle = tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        let client = Client::builder().cookie_store(true).build()?;
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            st2,
            _handle: handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path))
    }

    /// Authenticate the shared client; its cookie store keeps the session.
    pub async fn login(&self) -> Result<()> {
        let resp = self
            .post("/api/session/auth")
            .json(&json!({ "passphrase": PASSPHRASE }))
            .send()
            .await?;
        anyhow::ensure!(resp.status().is_success(), "login failed: {}", resp.status());
        Ok(())
    }

    /// A fresh client with its own (empty) cookie store.
    pub fn new_client(&self) -> Result<Client> {
        Ok(Client::builder().cookie_store(true).build()?)
    }

    /// POST an expression and return `(status, body)`.
    pub async fn evaluate(
        &self,
        kind: &str,
        expression: &str,
        data: Value,
    ) -> Result<(u16, Value)> {
        let resp = self
            .post(&format!("/api/evaluate/{kind}"))
            .json(&json!({ "expression": expression, "data": data }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}

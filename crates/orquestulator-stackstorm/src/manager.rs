//! Per-session connection selection.

use std::sync::Arc;

use orquestulator_config::ConnectionsFile;
use orquestulator_session::{ConnectionSelection, SessionStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{EXECUTION_LIST_LIMIT, Endpoint, St2Client};
use crate::error::{Result, StackStormError};

/// A configured connection as shown to clients (never includes the key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub alias: String,
}

/// The session's custom connection as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomConnectionView {
    pub url: String,
    pub api_key_set: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionListing {
    pub connections: Vec<ConnectionInfo>,
    pub default: Option<String>,
    /// The session's selection, or the default when it has none.
    pub current: Option<String>,
    pub custom_connection: Option<CustomConnectionView>,
}

/// Custom connection settings submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomConnection {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Outcome of a connection test. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
}

impl ConnectionTest {
    fn ok() -> Self {
        Self {
            success: true,
            message: "Connection successful".to_string(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Resolves each session's StackStorm connection and proxies requests to it.
#[derive(Clone)]
pub struct ConnectionManager {
    connections: Arc<ConnectionsFile>,
    store: Arc<dyn SessionStore>,
    client: St2Client,
}

impl ConnectionManager {
    pub fn new(
        connections: ConnectionsFile,
        store: Arc<dyn SessionStore>,
        client: St2Client,
    ) -> Self {
        Self {
            connections: Arc::new(connections),
            store,
            client,
        }
    }

    pub fn connections(&self) -> &ConnectionsFile {
        &self.connections
    }

    pub async fn list_connections(&self, session: &str) -> Result<ConnectionListing> {
        let selection = self.store.connection(session).await?;

        let custom_connection = match &selection {
            Some(ConnectionSelection::Custom { url, api_key }) => Some(CustomConnectionView {
                url: url.clone(),
                api_key_set: api_key.is_some(),
            }),
            _ => None,
        };
        let current = selection
            .as_ref()
            .map(|s| s.id().to_string())
            .or_else(|| self.connections.default.clone());

        Ok(ConnectionListing {
            connections: self
                .connections
                .connections
                .iter()
                .map(|c| ConnectionInfo {
                    id: c.id.clone(),
                    alias: c.display_name().to_string(),
                })
                .collect(),
            default: self.connections.default.clone(),
            current,
            custom_connection,
        })
    }

    /// Select connection `current` for the session. `"custom"` requires
    /// `custom` with a non-empty URL; any other id must be configured.
    pub async fn set_connection(
        &self,
        session: &str,
        current: &str,
        custom: Option<CustomConnection>,
    ) -> Result<ConnectionSelection> {
        let selection = if current == ConnectionSelection::CUSTOM_ID {
            let custom = custom.ok_or_else(|| {
                StackStormError::Validation(
                    "Custom connection data required when current is 'custom'".to_string(),
                )
            })?;
            if custom.url.trim().is_empty() {
                return Err(StackStormError::Validation(
                    "URL is required for custom connection".to_string(),
                ));
            }
            // Reject URLs we could never send a request to.
            Endpoint::new(custom.url.trim(), None)
                .validate()
                .map_err(|e| StackStormError::Validation(e.to_string()))?;
            ConnectionSelection::custom(custom.url, custom.api_key)
                .map_err(|e| StackStormError::Validation(e.to_string()))?
        } else {
            if self.connections.get(current).is_none() {
                return Err(StackStormError::Validation(format!(
                    "Connection '{current}' not found in preconfigured connections"
                )));
            }
            ConnectionSelection::named(current)
        };

        self.store
            .set_connection(session, Some(selection.clone()))
            .await?;
        info!(connection = selection.id(), "StackStorm connection updated");
        Ok(selection)
    }

    /// The endpoint requests for this session go to.
    pub async fn resolve(&self, session: &str) -> Result<Endpoint> {
        let id = match self.store.connection(session).await? {
            Some(ConnectionSelection::Custom { url, api_key }) => {
                return Ok(Endpoint::new(url, api_key));
            }
            Some(ConnectionSelection::Named { id }) => id,
            None => self.connections.default.clone().ok_or_else(|| {
                StackStormError::NoConnection(
                    "No StackStorm connection configured and no default connection available."
                        .to_string(),
                )
            })?,
        };
        let conn = self.connections.get(&id).ok_or_else(|| {
            StackStormError::NoConnection(format!(
                "Connection '{id}' not found in preconfigured connections."
            ))
        })?;
        Ok(Endpoint::new(conn.url.clone(), conn.api_key.clone()))
    }

    /// Probe the session's connection. Only session errors are returned as
    /// `Err`; every other failure becomes an unsuccessful [`ConnectionTest`].
    pub async fn test_connection(&self, session: &str) -> Result<ConnectionTest> {
        let endpoint = match self.resolve(session).await {
            Ok(endpoint) => endpoint,
            Err(StackStormError::Session(e)) => return Err(e.into()),
            Err(e) => return Ok(ConnectionTest::failed(e.to_string())),
        };

        let outcome = match self.client.probe(&endpoint).await {
            Ok(()) => ConnectionTest::ok(),
            Err(e) => ConnectionTest::failed(test_failure_message(&e)),
        };
        debug!(url = %endpoint.url, success = outcome.success, "StackStorm connection tested");
        Ok(outcome)
    }

    pub async fn fetch_execution(&self, session: &str, execution_id: &str) -> Result<Value> {
        let execution_id = execution_id.trim();
        if execution_id.is_empty() {
            return Err(StackStormError::Validation(
                "Execution id must not be empty".to_string(),
            ));
        }
        let endpoint = self.resolve(session).await?;
        self.client.execution(&endpoint, execution_id).await
    }

    pub async fn list_executions(&self, session: &str) -> Result<Vec<Value>> {
        let endpoint = self.resolve(session).await?;
        self.client
            .executions(&endpoint, EXECUTION_LIST_LIMIT)
            .await
    }
}

fn test_failure_message(err: &StackStormError) -> String {
    match err {
        StackStormError::Unauthorized => err.to_string(),
        StackStormError::Forbidden => "Connection failed: HTTP 403".to_string(),
        StackStormError::NotFound(_) => "Connection failed: HTTP 404".to_string(),
        StackStormError::Upstream { status, .. } => format!("Connection failed: HTTP {status}"),
        StackStormError::Unreachable(_) => "Failed to connect to StackStorm server".to_string(),
        StackStormError::Timeout => "Connection timed out".to_string(),
        other => format!("Connection test failed: {other}"),
    }
}

//! StackStorm API.

use serde_json::Value;

use crate::client::OrquestulatorClient;
use crate::error::Result;
use crate::types::{
    ConnectionRequest, Connections, CustomConnection, ExecutionResponse, ExecutionsResponse,
    StatusResponse,
};

/// StackStorm API client.
pub struct StackStormApi {
    client: OrquestulatorClient,
}

impl StackStormApi {
    pub(crate) fn new(client: OrquestulatorClient) -> Self {
        Self { client }
    }

    /// List configured connections and the session's current selection.
    pub async fn connections(&self) -> Result<Connections> {
        self.client.get("stackstorm/connection").await
    }

    /// Select a preconfigured connection by id.
    pub async fn set_connection(&self, id: &str) -> Result<StatusResponse> {
        let request = ConnectionRequest {
            current: id.to_string(),
            custom_connection: None,
        };
        self.client.put("stackstorm/connection", &request).await
    }

    /// Select an ad-hoc connection for this session.
    pub async fn use_custom(
        &self,
        url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<StatusResponse> {
        let request = ConnectionRequest {
            current: "custom".to_string(),
            custom_connection: Some(CustomConnection {
                url: url.into(),
                api_key,
            }),
        };
        self.client.put("stackstorm/connection", &request).await
    }

    /// Probe the current connection.
    pub async fn test(&self) -> Result<StatusResponse> {
        self.client.post_empty("stackstorm/connection/test").await
    }

    /// Recent executions.
    pub async fn executions(&self) -> Result<Vec<Value>> {
        let response: ExecutionsResponse = self.client.get("stackstorm/executions").await?;
        Ok(response.executions)
    }

    /// A single execution.
    pub async fn execution(&self, id: &str) -> Result<ExecutionResponse> {
        self.client
            .get(&format!("stackstorm/executions/{}", id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::OrquestulatorClient;

    fn client(server: &MockServer) -> OrquestulatorClient {
        OrquestulatorClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_use_custom_sends_selection() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/stackstorm/connection"))
            .and(body_json(json!({
                "current": "custom",
                "custom_connection": {"url": "https://st2.example.com"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Connection set to 'custom'"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client(&server)
            .stackstorm()
            .use_custom("https://st2.example.com", None)
            .await
            .unwrap();
        assert!(resp.success);
    }

    #[tokio::test]
    async fn test_missing_execution_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stackstorm/executions/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "not_found",
                "message": "Execution nope not found"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .stackstorm()
            .execution("nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_connections_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stackstorm/connection"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "connections": [{"id": "prod", "alias": "Production"}],
                "default": "prod",
                "current": "prod",
                "custom_connection": null
            })))
            .mount(&server)
            .await;

        let listing = client(&server).stackstorm().connections().await.unwrap();
        assert_eq!(listing.current.as_deref(), Some("prod"));
        assert_eq!(listing.connections[0].alias, "Production");
        assert!(listing.custom_connection.is_none());
    }
}

//! Session API.

use std::collections::HashMap;

use serde_json::Value;

use crate::client::OrquestulatorClient;
use crate::error::Result;
use crate::types::{
    AuthRequest, AuthResponse, AuthStatus, SessionCount, SessionDataRequest, SessionDataResponse,
};

/// Session API client.
pub struct SessionApi {
    client: OrquestulatorClient,
}

impl SessionApi {
    pub(crate) fn new(client: OrquestulatorClient) -> Self {
        Self { client }
    }

    /// Authenticate and start a session.
    ///
    /// Pass `None` when the server does not require a passphrase. The
    /// session cookie is kept by the client for later calls.
    pub async fn authenticate(&self, passphrase: Option<&str>) -> Result<AuthResponse> {
        let request = AuthRequest {
            passphrase: passphrase.map(str::to_string),
        };
        self.client.post("session/auth", &request).await
    }

    /// Report whether the current session is authenticated.
    pub async fn status(&self) -> Result<AuthStatus> {
        self.client.get("session/status").await
    }

    /// Fetch every key stored in the session.
    pub async fn data(&self) -> Result<HashMap<String, Value>> {
        let response: SessionDataResponse = self.client.get("session/data").await?;
        Ok(response.data.unwrap_or_default())
    }

    /// Fetch a single key.
    pub async fn value(&self, key: &str) -> Result<Option<Value>> {
        let mut data = self.data().await?;
        Ok(data.remove(key))
    }

    /// Merge `data` into the session; each key is replaced wholesale.
    pub async fn store(&self, data: HashMap<String, Value>) -> Result<SessionDataResponse> {
        self.client
            .post("session/data", &SessionDataRequest { data })
            .await
    }

    /// Store a single key.
    pub async fn store_value(&self, key: &str, value: Value) -> Result<SessionDataResponse> {
        self.store(HashMap::from([(key.to_string(), value)])).await
    }

    /// Session counts held by the server.
    pub async fn count(&self) -> Result<SessionCount> {
        self.client.get("session/count").await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::{Error, OrquestulatorClient};

    async fn client(server: &MockServer) -> OrquestulatorClient {
        OrquestulatorClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_keeps_session_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/session/auth"))
            .and(body_json(json!({"passphrase": "Ch@ngeMe"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "session_id=tok; Path=/; HttpOnly")
                    .set_body_json(json!({
                        "success": true,
                        "authenticated": true,
                        "passphrase_required": true,
                        "message": "Successfully authenticated"
                    })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/session/data"))
            .and(wiremock::matchers::header("cookie", "session_id=tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "data": {"theme": "dark"}})),
            )
            .mount(&server)
            .await;

        let client = client(&server).await;
        let auth = client.session().authenticate(Some("Ch@ngeMe")).await.unwrap();
        assert!(auth.authenticated);

        let theme = client.session().value("theme").await.unwrap();
        assert_eq!(theme, Some(json!("dark")));
        assert_eq!(client.session().value("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_passphrase_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/session/auth"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"code": "unauthorized", "message": "Invalid passphrase"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .session()
            .authenticate(Some("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(ref m) if m == "Invalid passphrase"));
    }

    #[tokio::test]
    async fn test_store_value_sends_single_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/session/data"))
            .and(body_json(json!({"data": {"yaql_expression": "$.a"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Successfully stored data in session"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client(&server)
            .await
            .session()
            .store_value("yaql_expression", json!("$.a"))
            .await
            .unwrap();
        assert!(resp.success);
    }
}

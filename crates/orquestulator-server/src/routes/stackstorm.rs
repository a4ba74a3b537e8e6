//! StackStorm connection and execution endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use orquestulator_stackstorm::{ConnectionListing, ConnectionTest, CustomConnection};

use crate::auth::CurrentSession;
use crate::error::{ErrorResponse, ServerError};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// A configured connection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionSummary {
    pub id: String,
    /// Display name; the id when no alias is configured.
    pub alias: String,
}

/// The session's custom connection. The API key is never returned.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomConnectionSummary {
    pub url: String,
    pub api_key_set: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionsResponse {
    pub connections: Vec<ConnectionSummary>,
    pub default: Option<String>,
    /// Selected connection id, `"custom"`, or the default.
    pub current: Option<String>,
    pub custom_connection: Option<CustomConnectionSummary>,
}

impl From<ConnectionListing> for ConnectionsResponse {
    fn from(listing: ConnectionListing) -> Self {
        Self {
            connections: listing
                .connections
                .into_iter()
                .map(|c| ConnectionSummary {
                    id: c.id,
                    alias: c.alias,
                })
                .collect(),
            default: listing.default,
            current: listing.current,
            custom_connection: listing.custom_connection.map(|c| CustomConnectionSummary {
                url: c.url,
                api_key_set: c.api_key_set,
            }),
        }
    }
}

/// Custom connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CustomConnectionRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Request to select a connection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionRequest {
    /// A configured connection id, or `"custom"`.
    pub current: String,
    #[serde(default)]
    pub custom_connection: Option<CustomConnectionRequest>,
}

/// Outcome of a connection update or test.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionStatusResponse {
    pub success: bool,
    pub message: String,
}

impl From<ConnectionTest> for ConnectionStatusResponse {
    fn from(test: ConnectionTest) -> Self {
        Self {
            success: test.success,
            message: test.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionsResponse {
    #[schema(value_type = Vec<Object>)]
    pub executions: Vec<Value>,
}

/// A single execution as returned by StackStorm.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionResponse {
    #[schema(value_type = Object)]
    pub execution_data: Value,
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// List configured connections and the session's selection.
#[utoipa::path(
    get,
    path = "/api/stackstorm/connection",
    responses(
        (status = 200, description = "Connection listing", body = ConnectionsResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    tag = "stackstorm"
)]
pub async fn get_connection_handler(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<ConnectionsResponse>, ServerError> {
    let listing = state.stackstorm.list_connections(session.id()).await?;
    Ok(Json(listing.into()))
}

/// Select a configured or custom connection for the session.
#[utoipa::path(
    put,
    path = "/api/stackstorm/connection",
    request_body = ConnectionRequest,
    responses(
        (status = 200, description = "Connection selected", body = ConnectionStatusResponse),
        (status = 400, description = "Unknown connection or missing URL", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    tag = "stackstorm"
)]
pub async fn set_connection_handler(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    WithRejection(Json(request), _): WithRejection<Json<ConnectionRequest>, ServerError>,
) -> Result<Json<ConnectionStatusResponse>, ServerError> {
    let custom = request.custom_connection.map(|c| CustomConnection {
        url: c.url,
        api_key: c.api_key,
    });
    let selection = state
        .stackstorm
        .set_connection(session.id(), &request.current, custom)
        .await?;

    Ok(Json(ConnectionStatusResponse {
        success: true,
        message: format!("Connection set to '{}'", selection.id()),
    }))
}

/// Probe the session's connection. Failures are reported in the body.
#[utoipa::path(
    post,
    path = "/api/stackstorm/connection/test",
    responses(
        (status = 200, description = "Test outcome", body = ConnectionStatusResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    tag = "stackstorm"
)]
pub async fn test_connection_handler(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<ConnectionStatusResponse>, ServerError> {
    let outcome = state.stackstorm.test_connection(session.id()).await?;
    Ok(Json(outcome.into()))
}

/// Recent executions on the session's connection.
#[utoipa::path(
    get,
    path = "/api/stackstorm/executions",
    responses(
        (status = 200, description = "Recent executions", body = ExecutionsResponse),
        (status = 400, description = "No connection configured", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 502, description = "StackStorm rejected the request", body = ErrorResponse),
        (status = 503, description = "StackStorm unreachable", body = ErrorResponse),
    ),
    tag = "stackstorm"
)]
pub async fn list_executions_handler(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<ExecutionsResponse>, ServerError> {
    let executions = state.stackstorm.list_executions(session.id()).await?;
    Ok(Json(ExecutionsResponse { executions }))
}

/// Fetch one execution, typically to pre-populate a task result.
#[utoipa::path(
    get,
    path = "/api/stackstorm/executions/{id}",
    params(
        ("id" = String, Path, description = "Execution ID"),
    ),
    responses(
        (status = 200, description = "Execution found", body = ExecutionResponse),
        (status = 400, description = "No connection configured", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "StackStorm denied access", body = ErrorResponse),
        (status = 404, description = "Execution not found", body = ErrorResponse),
        (status = 502, description = "StackStorm rejected the API key", body = ErrorResponse),
        (status = 503, description = "StackStorm unreachable", body = ErrorResponse),
        (status = 504, description = "StackStorm timed out", body = ErrorResponse),
    ),
    tag = "stackstorm"
)]
pub async fn get_execution_handler(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionResponse>, ServerError> {
    let execution_data = state.stackstorm.fetch_execution(session.id(), &id).await?;
    let status = execution_data
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let message = format!("Execution loaded successfully! Status: {status}");

    Ok(Json(ExecutionResponse {
        execution_data,
        message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orquestulator_stackstorm::{ConnectionInfo, CustomConnectionView};

    #[test]
    fn test_listing_conversion_hides_key() {
        let listing = ConnectionListing {
            connections: vec![ConnectionInfo {
                id: "prod".into(),
                alias: "Production".into(),
            }],
            default: Some("prod".into()),
            current: Some("custom".into()),
            custom_connection: Some(CustomConnectionView {
                url: "https://st2.local".into(),
                api_key_set: true,
            }),
        };
        let body = serde_json::to_value(ConnectionsResponse::from(listing)).unwrap();
        assert_eq!(body["current"], "custom");
        assert_eq!(body["connections"][0]["alias"], "Production");
        assert_eq!(body["custom_connection"]["api_key_set"], true);
        assert!(body["custom_connection"].get("api_key").is_none());
    }
}

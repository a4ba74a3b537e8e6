//! Request and response types for the Orquestulator API.
//!
//! These types mirror the server's API contract.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub authenticated: bool,
    pub passphrase_required: bool,
    pub message: String,
}

/// Authentication state reported by `GET /api/session/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub passphrase_required: bool,
    /// Last recorded activity (ISO 8601).
    #[serde(default)]
    pub last_activity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDataRequest {
    pub data: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDataResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCount {
    pub total_sessions: usize,
    pub active_sessions: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluate
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub expression: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub result: Value,
    pub query_type: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// StackStorm
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub id: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomConnectionSummary {
    pub url: String,
    pub api_key_set: bool,
}

/// Configured connections and the session's selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connections {
    pub connections: Vec<ConnectionSummary>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub custom_connection: Option<CustomConnectionSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomConnection {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub current: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_connection: Option<CustomConnection>,
}

/// `{success, message}` reply of connection updates and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionsResponse {
    pub executions: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub execution_data: Value,
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

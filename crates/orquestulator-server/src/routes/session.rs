//! Session endpoints: authentication, status and the per-session data map.

use std::collections::HashMap;

use axum::{Extension, Json, extract::State};
use axum_extra::extract::{WithRejection, cookie::CookieJar};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::auth::{CurrentSession, session_cookie, session_token, verify_passphrase};
use crate::error::{ErrorResponse, ServerError};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request to authenticate.
#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthRequest {
    /// Shared passphrase. Ignored when the server requires none.
    #[serde(default)]
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub authenticated: bool,
    pub passphrase_required: bool,
    pub message: String,
}

/// Authentication state of the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    pub passphrase_required: bool,
    /// Last recorded activity (ISO 8601), when authenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

/// Request to store session data.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionDataRequest {
    /// Keys to replace. Keys not listed are left untouched.
    #[schema(value_type = Object)]
    pub data: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionDataResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Session counts for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionCountResponse {
    pub total_sessions: usize,
    pub active_sessions: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Authenticate with the passphrase and start a session.
#[utoipa::path(
    post,
    path = "/api/session/auth",
    request_body = AuthRequest,
    responses(
        (status = 200, description = "Session created; cookie set", body = AuthResponse),
        (status = 401, description = "Invalid passphrase", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn authenticate_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(body, _): WithRejection<Option<Json<AuthRequest>>, ServerError>,
) -> Result<(CookieJar, Json<AuthResponse>), ServerError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();

    if !verify_passphrase(&state.config, request.passphrase.as_deref()) {
        return Err(ServerError::InvalidPassphrase);
    }

    let id = state.sessions.create_session().await;
    tracing::info!("Session authenticated");

    let jar = jar.add(session_cookie(&state.config.cookie, id));
    Ok((
        jar,
        Json(AuthResponse {
            success: true,
            authenticated: true,
            passphrase_required: state.config.passphrase_required,
            message: "Successfully authenticated".to_string(),
        }),
    ))
}

/// Report whether the caller holds a live session. Never fails with 401.
#[utoipa::path(
    get,
    path = "/api/session/status",
    responses(
        (status = 200, description = "Authentication status", body = AuthStatusResponse),
    ),
    tag = "session"
)]
pub async fn status_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Json<AuthStatusResponse> {
    let passphrase_required = state.config.passphrase_required;

    let info = match session_token(&jar, &state.config.cookie) {
        Some(token) => state.sessions.touch(token).await.ok(),
        None => None,
    };

    Json(AuthStatusResponse {
        authenticated: info.is_some(),
        passphrase_required,
        last_activity: info.map(|info| info.last_seen_at.to_rfc3339()),
    })
}

/// Return the whole data map of the session.
#[utoipa::path(
    get,
    path = "/api/session/data",
    responses(
        (status = 200, description = "Session data", body = SessionDataResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn get_data_handler(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<SessionDataResponse>, ServerError> {
    let data = state.sessions.data(session.id()).await?;
    Ok(Json(SessionDataResponse {
        success: true,
        data: Some(data),
        message: None,
    }))
}

/// Replace the listed keys in the session data map.
#[utoipa::path(
    post,
    path = "/api/session/data",
    request_body = SessionDataRequest,
    responses(
        (status = 200, description = "Data stored", body = SessionDataResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn store_data_handler(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    WithRejection(Json(request), _): WithRejection<Json<SessionDataRequest>, ServerError>,
) -> Result<Json<SessionDataResponse>, ServerError> {
    let keys = request.data.len();
    state.sessions.put_many(session.id(), request.data).await?;
    tracing::debug!(keys, "Stored session data");

    Ok(Json(SessionDataResponse {
        success: true,
        data: None,
        message: Some("Successfully stored data in session".to_string()),
    }))
}

#[utoipa::path(
    get,
    path = "/api/session/count",
    responses(
        (status = 200, description = "Session counts", body = SessionCountResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    tag = "session"
)]
pub async fn count_handler(
    State(state): State<AppState>,
    Extension(_session): Extension<CurrentSession>,
) -> Json<SessionCountResponse> {
    let stats = state.sessions.stats().await;
    Json(SessionCountResponse {
        total_sessions: stats.total_sessions,
        active_sessions: stats.active_sessions,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Error types for the server.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use orquestulator_eval::EvalError;
use orquestulator_stackstorm::StackStormError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing, unknown or expired session. Every cause produces the same
    /// response.
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Invalid passphrase")]
    InvalidPassphrase,

    /// Bad request.
    #[error("{0}")]
    BadRequest(String),

    /// Request content failed validation.
    #[error("{0}")]
    Validation(String),

    /// Expression failed to parse or evaluate.
    #[error("{message}")]
    Evaluation { query_type: String, message: String },

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// StackStorm rejected the configured API key. Relayed as a gateway
    /// error so clients do not mistake it for their own session expiring.
    #[error("StackStorm authentication failed: {0}")]
    UpstreamUnauthorized(String),

    #[error("StackStorm denied access: {0}")]
    UpstreamForbidden(String),

    #[error("{0}")]
    Upstream(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Service unavailable.
    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    GatewayTimeout(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServerError {
    pub fn evaluation(query_type: impl Into<String>, err: &EvalError) -> Self {
        Self::Evaluation {
            query_type: query_type.into(),
            message: err.to_string(),
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ServerError::InvalidPassphrase => (StatusCode::UNAUTHORIZED, "invalid_passphrase"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ServerError::Evaluation { .. } => (StatusCode::BAD_REQUEST, "evaluation_error"),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::UpstreamUnauthorized(_) => {
                (StatusCode::BAD_GATEWAY, "upstream_unauthorized")
            }
            ServerError::UpstreamForbidden(_) => (StatusCode::FORBIDDEN, "upstream_forbidden"),
            ServerError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            ServerError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded")
            }
            ServerError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            ServerError::GatewayTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ServerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status_and_code().0
    }
}

impl From<orquestulator_session::Error> for ServerError {
    fn from(e: orquestulator_session::Error) -> Self {
        match e {
            orquestulator_session::Error::NotAuthenticated => ServerError::Unauthorized,
            orquestulator_session::Error::InvalidConnection(msg) => ServerError::Validation(msg),
        }
    }
}

/// Body extraction failures. Well-formed JSON of the wrong shape is a
/// validation error; everything else is a bad request.
impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => ServerError::Validation(e.body_text()),
            other => ServerError::BadRequest(other.body_text()),
        }
    }
}

impl From<StackStormError> for ServerError {
    fn from(e: StackStormError) -> Self {
        match e {
            StackStormError::Session(e) => e.into(),
            StackStormError::Validation(msg) | StackStormError::InvalidUrl(msg) => {
                ServerError::Validation(msg)
            }
            StackStormError::NoConnection(msg) => ServerError::BadRequest(msg),
            StackStormError::Unauthorized => {
                ServerError::UpstreamUnauthorized("Invalid API key".to_string())
            }
            StackStormError::Forbidden => {
                ServerError::UpstreamForbidden("check the API key permissions".to_string())
            }
            StackStormError::NotFound(msg) => ServerError::NotFound(msg),
            e @ (StackStormError::Upstream { .. } | StackStormError::InvalidResponse(_)) => {
                ServerError::Upstream(e.to_string())
            }
            e @ StackStormError::Unreachable(_) => ServerError::ServiceUnavailable(e.to_string()),
            e @ StackStormError::Timeout => ServerError::GatewayTimeout(e.to_string()),
            StackStormError::Client(msg) => ServerError::Internal(msg),
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Present on evaluation errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let query_type = match self {
            ServerError::Evaluation { query_type, .. } => Some(query_type),
            _ => None,
        };
        let body = ErrorResponse {
            code: code.to_string(),
            message,
            query_type,
        };

        (status, Json(body)).into_response()
    }
}

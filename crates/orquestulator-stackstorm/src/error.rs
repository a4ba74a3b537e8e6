//! StackStorm error types.

use thiserror::Error;

/// Errors raised while resolving a connection or talking to StackStorm.
#[derive(Debug, Error)]
pub enum StackStormError {
    /// The session is unknown or expired.
    #[error(transparent)]
    Session(#[from] orquestulator_session::Error),

    /// The requested connection settings are invalid.
    #[error("{0}")]
    Validation(String),

    /// No usable connection: nothing selected and no default, or the
    /// selected id is no longer configured.
    #[error("{0}")]
    NoConnection(String),

    /// StackStorm rejected the API key (HTTP 401).
    #[error("Authentication failed: Invalid API key")]
    Unauthorized,

    /// StackStorm refused access (HTTP 403).
    #[error("Access denied by StackStorm")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("StackStorm API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Failed to connect to StackStorm: {0}")]
    Unreachable(String),

    #[error("StackStorm request timed out")]
    Timeout,

    /// The response body was not the JSON we expected.
    #[error("Invalid response from StackStorm: {0}")]
    InvalidResponse(String),

    #[error("Invalid StackStorm URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl StackStormError {
    /// Classify a transport-level reqwest failure.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }

    /// Whether the error came from the remote side or the network rather
    /// than from the caller's input.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized
                | Self::Forbidden
                | Self::NotFound(_)
                | Self::Upstream { .. }
                | Self::Unreachable(_)
                | Self::Timeout
                | Self::InvalidResponse(_)
        )
    }
}

/// Result type for StackStorm operations.
pub type Result<T> = std::result::Result<T, StackStormError>;

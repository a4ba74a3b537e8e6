//! Client error types.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend could not be reached (connection refused, DNS failure).
    #[error("could not reach backend: {0}")]
    Unreachable(String),

    /// The request did not complete within the client timeout.
    #[error("request timed out")]
    Timeout,

    /// Any other transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error code from server.
        code: String,
        /// Error message from server.
        message: String,
    },

    /// The session is missing or expired, or the passphrase was wrong.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() {
            Error::Unreachable(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_)) || matches!(self, Error::Api { status: 404, .. })
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_)) || matches!(self, Error::Api { status: 401, .. })
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::Api { status: 429, .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }

    /// Transport-level failure, as opposed to an error the server returned.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            Error::Unreachable(_) | Error::Timeout | Error::Network(_)
        )
    }

    /// A message suitable for showing to an end user.
    pub fn friendly_message(&self) -> String {
        match self {
            Error::Unreachable(_) => {
                "Could not reach the Orquestulator backend. Check that the server is running."
                    .to_string()
            }
            Error::Timeout => "The request timed out. Please try again.".to_string(),
            Error::Network(_) => "A network error occurred. Please try again.".to_string(),
            Error::Auth(_) => "Your session has expired. Please sign in again.".to_string(),
            Error::Api { message, .. } | Error::NotFound(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error response from the server.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub query_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = Error::Api {
            status: 503,
            code: "service_unavailable".into(),
            message: "StackStorm unreachable".into(),
        };
        assert!(err.is_server_error());
        assert!(!err.is_network_error());
        assert_eq!(err.friendly_message(), "StackStorm unreachable");

        assert!(Error::Timeout.is_network_error());
        assert!(Error::Auth("Not authenticated".into()).is_auth_error());
        assert!(Error::NotFound("x".into()).is_not_found());
    }

    #[test]
    fn test_friendly_messages_hide_transport_detail() {
        let err = Error::Unreachable("tcp connect error: Connection refused (os error 111)".into());
        assert!(!err.friendly_message().contains("os error"));
        assert_eq!(
            Error::Timeout.friendly_message(),
            "The request timed out. Please try again."
        );
    }
}

//! Error types for session store operations.

/// Error type for session store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The session id is unknown, expired, or was evicted.
    ///
    /// These cases are deliberately indistinguishable to callers.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// A connection selection failed its structural checks.
    #[error("Invalid connection selection: {0}")]
    InvalidConnection(String),
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;

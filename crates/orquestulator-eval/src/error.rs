//! Evaluation error types.

use crate::QueryKind;

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors raised while preparing or evaluating an expression.
///
/// All variants are user errors: the message is meant to be shown next to
/// the expression that caused it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// The requested query type is not one of `orquesta`, `yaql`, `jinja2`.
    #[error("Unsupported query type: {0}")]
    UnsupportedKind(String),

    /// The data payload is malformed (e.g. an unknown `__task_status`).
    #[error("{0}")]
    InvalidPayload(String),

    /// The expression could not be parsed.
    #[error("{kind} syntax error: {message}")]
    Syntax { kind: QueryKind, message: String },

    /// The expression parsed but failed while evaluating.
    #[error("{0}")]
    Evaluation(String),
}

impl EvalError {
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    pub fn syntax(kind: QueryKind, message: impl Into<String>) -> Self {
        Self::Syntax {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }
}

impl From<minijinja::Error> for EvalError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        // `Display` on minijinja errors omits the chained cause.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        match err.kind() {
            ErrorKind::SyntaxError => Self::syntax(QueryKind::Jinja2, message),
            _ => Self::Evaluation(message),
        }
    }
}

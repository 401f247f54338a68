//! Error handling for rag-eval.
//!
//! This module provides:
//! - [`EvalError`]: The main error enum for all library operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type with suggestion and context for machine output

mod codes;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;

/// Main error type for rag-eval operations.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Malformed query construction input, rejected before reaching the backend.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The search/index call failed.
    #[error("Backend error: {message}")]
    Backend {
        /// HTTP status, `None` for transport failures.
        status: Option<u16>,
        message: String,
    },

    /// The backend answered, but not with the envelope a search returns.
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// The embedding capability failed to produce a vector.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A metric has no defined value for the given input (e.g. empty ground truth).
    #[error("Metric undefined: {0}")]
    MetricUndefined(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl EvalError {
    /// Backend failure without an HTTP status (connection, timeout).
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            status: None,
            message: message.into(),
        }
    }

    /// Backend failure carrying the HTTP status returned by the server.
    pub fn backend_status(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::QueryInvalid,
            Self::Backend { status: None, .. } => ErrorCode::BackendUnavailable,
            Self::Backend { status: Some(404), .. } => ErrorCode::IndexNotFound,
            Self::Backend { .. } | Self::MalformedResponse(_) => ErrorCode::BackendFailed,
            Self::Encoding(_) => ErrorCode::EncodingFailed,
            Self::MetricUndefined(_) => ErrorCode::MetricUndefined,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::NotFound(_) => ErrorCode::NotFound,
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Transport failures and HTTP 429/5xx responses are transient; everything
    /// else is a property of the input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Backend { status: None, .. } => true,
            Self::Backend {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::Backend {
                status: Some(status),
                ..
            } => Some(serde_json::json!({ "http_status": status })),
            Self::NotFound(what) => Some(serde_json::json!({ "path": what })),
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_eval_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "METRIC_UNDEFINED")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 601)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether retrying the same operation may succeed
    pub retryable: bool,

    /// Error category (e.g., "search", "config", "encoder")
    pub category: String,
}

impl StructuredError {
    /// Create a new structured error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            retryable: false,
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from an [`EvalError`].
    #[must_use]
    pub fn from_eval_error(err: &EvalError) -> Self {
        let code = err.code();
        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            suggestion: code.suggestion().to_string(),
            context: err.context(),
            retryable: err.is_retryable(),
            category: code.category().to_string(),
        }
    }

    /// Add context to this error.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&EvalError> for StructuredError {
    fn from(err: &EvalError) -> Self {
        Self::from_eval_error(err)
    }
}

/// Result type alias using [`EvalError`].
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            EvalError::Validation("empty company".into()).code(),
            ErrorCode::QueryInvalid
        );
        assert_eq!(
            EvalError::MetricUndefined("no entries".into()).code(),
            ErrorCode::MetricUndefined
        );
        assert_eq!(
            EvalError::backend_status(404, "no such index").code(),
            ErrorCode::IndexNotFound
        );
        assert_eq!(
            EvalError::backend_status(400, "parse failure").code(),
            ErrorCode::BackendFailed
        );
        assert_eq!(
            EvalError::backend("connection refused").code(),
            ErrorCode::BackendUnavailable
        );
        assert_eq!(
            EvalError::MalformedResponse("missing hits.hits".into()).code(),
            ErrorCode::BackendFailed
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(EvalError::backend("connection reset").is_retryable());
        assert!(EvalError::backend_status(503, "unavailable").is_retryable());
        assert!(EvalError::backend_status(429, "too many requests").is_retryable());
        assert!(!EvalError::backend_status(400, "bad query").is_retryable());
        assert!(!EvalError::Validation("k > num_candidates".into()).is_retryable());
        assert!(!EvalError::Encoding("model missing".into()).is_retryable());
        assert!(!EvalError::MalformedResponse("no _source".into()).is_retryable());
    }

    #[test]
    fn test_backend_context_carries_status() {
        let err = EvalError::backend_status(500, "boom");
        let ctx = err.context().unwrap();
        assert_eq!(ctx["http_status"], 500);
        assert!(EvalError::backend("boom").context().is_none());
    }

    #[test]
    fn test_structured_error_from_eval_error() {
        let err = EvalError::MetricUndefined("ground truth is empty".into());
        let structured = err.to_structured();

        assert_eq!(structured.code, ErrorCode::MetricUndefined);
        assert_eq!(structured.numeric_code, 601);
        assert!(structured.message.contains("ground truth is empty"));
        assert!(!structured.suggestion.is_empty());
        assert!(!structured.retryable);
        assert_eq!(structured.category, "evaluation");
    }

    #[test]
    fn test_structured_error_serialization() {
        let err = StructuredError::new(ErrorCode::QueryInvalid, "company filter is empty");
        let json = serde_json::to_string(&err).unwrap();

        assert!(json.contains("QUERY_INVALID"));
        assert!(json.contains("\"numeric_code\":401"));
        assert!(json.contains("\"category\":\"search\""));
    }

    #[test]
    fn test_structured_error_display() {
        let err = StructuredError::new(ErrorCode::EncodingFailed, "tokenizer missing");
        let display = format!("{err}");
        assert!(display.contains("E501"));
        assert!(display.contains("tokenizer missing"));
    }
}

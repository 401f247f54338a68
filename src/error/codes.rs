//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 2xx: Index errors
//! - 3xx: Config errors
//! - 4xx: Search errors
//! - 5xx: Encoder errors
//! - 6xx: Evaluation errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for machine output.
///
/// Each variant maps to a numeric code (e.g., `QueryInvalid` -> E401).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Index errors (2xx)
    // ========================================
    /// E201: The target index does not exist
    IndexNotFound,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Config file has invalid syntax or values
    ConfigInvalid,

    // ========================================
    // Search errors (4xx)
    // ========================================
    /// E401: Query construction input was rejected
    QueryInvalid,
    /// E402: The backend rejected the request or returned malformed data
    BackendFailed,
    /// E403: The backend could not be reached
    BackendUnavailable,

    // ========================================
    // Encoder errors (5xx)
    // ========================================
    /// E501: The encoder failed to load or to produce a vector
    EncodingFailed,

    // ========================================
    // Evaluation errors (6xx)
    // ========================================
    /// E601: A metric is undefined for the input (e.g. empty ground truth)
    MetricUndefined,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: IO operation failed
    IoError,
    /// E902: Serialization/deserialization failed
    SerializationError,
    /// E903: Generic not found (catch-all)
    NotFound,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `QueryInvalid` -> 401).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::IndexNotFound => 201,
            Self::ConfigInvalid => 301,
            Self::QueryInvalid => 401,
            Self::BackendFailed => 402,
            Self::BackendUnavailable => 403,
            Self::EncodingFailed => 501,
            Self::MetricUndefined => 601,
            Self::IoError => 901,
            Self::SerializationError => 902,
            Self::NotFound => 903,
        }
    }

    /// Get the error code as a formatted string (e.g., "E401").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::IndexNotFound => "Run `rag-eval index <corpus>` to create and populate the index",
            Self::ConfigInvalid => "Run `rag-eval config` to see current values. Check TOML syntax and RAG_EVAL_* variables",
            Self::QueryInvalid => "Check the company filter, vector field list, k/num_candidates and boost values",
            Self::BackendFailed => "Inspect the backend error reason. Run the query with --raw to see the full response",
            Self::BackendUnavailable => "Check that the search backend is running and backend.url is correct",
            Self::EncodingFailed => "Check encoder.endpoint and encoder.dims, and that the model server has loaded the model",
            Self::MetricUndefined => "Provide a non-empty ground truth file",
            Self::IoError => "File operation failed. Check path exists and permissions are correct",
            Self::SerializationError => "The data format may be corrupted. Check input data for validity",
            Self::NotFound => "The requested resource was not found. Check the path or identifier",
        }
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            2 => "index",
            3 => "config",
            4 => "search",
            5 => "encoder",
            6 => "evaluation",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::IndexNotFound,
            Self::ConfigInvalid,
            Self::QueryInvalid,
            Self::BackendFailed,
            Self::BackendUnavailable,
            Self::EncodingFailed,
            Self::MetricUndefined,
            Self::IoError,
            Self::SerializationError,
            Self::NotFound,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_numeric() {
        assert_eq!(ErrorCode::IndexNotFound.numeric(), 201);
        assert_eq!(ErrorCode::ConfigInvalid.numeric(), 301);
        assert_eq!(ErrorCode::QueryInvalid.numeric(), 401);
        assert_eq!(ErrorCode::EncodingFailed.numeric(), 501);
        assert_eq!(ErrorCode::MetricUndefined.numeric(), 601);
        assert_eq!(ErrorCode::IoError.numeric(), 901);
    }

    #[test]
    fn test_all_codes_have_suggestions_and_categories() {
        for code in ErrorCode::all() {
            assert!(!code.suggestion().is_empty(), "{code:?} has empty suggestion");
            assert_ne!(code.category(), "unknown", "{code:?} has invalid category");
        }
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::MetricUndefined).unwrap();
        assert_eq!(json, "\"METRIC_UNDEFINED\"");

        let deserialized: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, ErrorCode::MetricUndefined);
    }

    #[test]
    fn test_no_duplicate_numeric_codes() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::all() {
            assert!(seen.insert(code.numeric()), "Duplicate numeric code: {}", code.numeric());
        }
    }
}

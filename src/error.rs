//! Error types for Notetion
//!
//! This module defines the error taxonomy used throughout the pipeline,
//! using `thiserror` for ergonomic error handling. `FailureKind` is the
//! persisted, caller-facing form of a failure reason.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Main error type for Notetion operations
///
/// Every variant of the pipeline taxonomy carries a human-readable detail
/// message. Conversions from library errors are provided for the ambient
/// concerns (IO, serialization, HTTP, credential storage).
#[derive(Error, Debug)]
pub enum NotetionError {
    /// A caller-supplied parameter is out of range or malformed
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input exceeds the configured byte ceiling
    #[error("Input too large: {size} bytes exceeds limit of {limit} bytes")]
    InputTooLarge {
        /// Size of the rejected input in bytes
        size: u64,
        /// Configured ceiling in bytes
        limit: u64,
    },

    /// The document has no extractable text or an unsupported type
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    /// The document could not be decoded (invalid JSON, invalid UTF-8)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Every supplied file failed to parse
    #[error("No usable input: {0}")]
    NoUsableInput(String),

    /// The model identifier is missing from the pricing table
    #[error("Unknown model: {model}{}", suggestion_suffix(.suggestion))]
    UnknownModel {
        /// The model that was requested
        model: String,
        /// Closest configured model, if any
        suggestion: Option<String>,
    },

    /// Missing or rejected provider credentials
    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    /// Provider throttled the request (retryable)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Provider unreachable or failing server-side (retryable)
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider refused the request (policy filter, bad request)
    #[error("Content rejected: {0}")]
    ContentRejected(String),

    /// Session store errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The invoking context cancelled the session
    #[error("Session cancelled")]
    Cancelled,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{}'?)", s))
        .unwrap_or_default()
}

impl NotetionError {
    /// Returns the taxonomy kind of this error, if it belongs to the taxonomy
    pub fn kind(&self) -> Option<FailureKind> {
        let kind = match self {
            Self::InvalidParameter(_) => FailureKind::InvalidParameter,
            Self::InputTooLarge { .. } => FailureKind::InputTooLarge,
            Self::UnsupportedContent(_) => FailureKind::UnsupportedContent,
            Self::MalformedInput(_) => FailureKind::MalformedInput,
            Self::NoUsableInput(_) => FailureKind::NoUsableInput,
            Self::UnknownModel { .. } => FailureKind::UnknownModel,
            Self::AuthenticationFailure(_) => FailureKind::AuthenticationFailure,
            Self::RateLimited(_) => FailureKind::RateLimited,
            Self::ProviderUnavailable(_) => FailureKind::ProviderUnavailable,
            Self::ContentRejected(_) => FailureKind::ContentRejected,
            Self::Storage(_) => FailureKind::StorageFailure,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Yaml(_)
            | Self::Http(_)
            | Self::Keyring(_) => return None,
        };
        Some(kind)
    }
}

/// Persisted failure reason for sessions and files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidParameter,
    InputTooLarge,
    UnsupportedContent,
    MalformedInput,
    NoUsableInput,
    UnknownModel,
    AuthenticationFailure,
    RateLimited,
    ProviderUnavailable,
    ContentRejected,
    StorageFailure,
    Cancelled,
}

impl FailureKind {
    const ALL: [FailureKind; 12] = [
        Self::InvalidParameter,
        Self::InputTooLarge,
        Self::UnsupportedContent,
        Self::MalformedInput,
        Self::NoUsableInput,
        Self::UnknownModel,
        Self::AuthenticationFailure,
        Self::RateLimited,
        Self::ProviderUnavailable,
        Self::ContentRejected,
        Self::StorageFailure,
        Self::Cancelled,
    ];

    /// Stable name used in the database and in exports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidParameter => "InvalidParameter",
            Self::InputTooLarge => "InputTooLarge",
            Self::UnsupportedContent => "UnsupportedContent",
            Self::MalformedInput => "MalformedInput",
            Self::NoUsableInput => "NoUsableInput",
            Self::UnknownModel => "UnknownModel",
            Self::AuthenticationFailure => "AuthenticationFailure",
            Self::RateLimited => "RateLimited",
            Self::ProviderUnavailable => "ProviderUnavailable",
            Self::ContentRejected => "ContentRejected",
            Self::StorageFailure => "StorageFailure",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether the generation client should retry this failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ProviderUnavailable)
    }

    /// Classifies an arbitrary error by looking for a `NotetionError` in it
    ///
    /// Returns `None` for errors outside the taxonomy (config, raw IO, ...).
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::error::{FailureKind, NotetionError};
    ///
    /// let err = anyhow::Error::from(NotetionError::RateLimited("slow down".into()));
    /// assert_eq!(FailureKind::of(&err), Some(FailureKind::RateLimited));
    /// ```
    pub fn of(err: &anyhow::Error) -> Option<FailureKind> {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<NotetionError>())
            .and_then(NotetionError::kind)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = NotetionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| NotetionError::Storage(format!("Unknown failure kind: {}", s)))
    }
}

/// Result type alias for Notetion operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation. Taxonomy
/// errors are recovered with [`FailureKind::of`].
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_display() {
        let error = NotetionError::InvalidParameter("creativity must be in [0, 1]".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid parameter: creativity must be in [0, 1]"
        );
    }

    #[test]
    fn test_input_too_large_display() {
        let error = NotetionError::InputTooLarge {
            size: 2048,
            limit: 1024,
        };
        let s = error.to_string();
        assert!(s.contains("2048"));
        assert!(s.contains("1024"));
    }

    #[test]
    fn test_unknown_model_display_with_suggestion() {
        let error = NotetionError::UnknownModel {
            model: "gpt4".to_string(),
            suggestion: Some("gpt-4".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "Unknown model: gpt4 (did you mean 'gpt-4'?)"
        );
    }

    #[test]
    fn test_unknown_model_display_without_suggestion() {
        let error = NotetionError::UnknownModel {
            model: "mystery".to_string(),
            suggestion: None,
        };
        assert_eq!(error.to_string(), "Unknown model: mystery");
    }

    #[test]
    fn test_storage_error_display() {
        let error = NotetionError::Storage("database connection failed".to_string());
        assert_eq!(
            error.to_string(),
            "Storage error: database connection failed"
        );
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            NotetionError::Storage("x".into()).kind(),
            Some(FailureKind::StorageFailure)
        );
        assert_eq!(NotetionError::Cancelled.kind(), Some(FailureKind::Cancelled));
        assert_eq!(NotetionError::Config("x".into()).kind(), None);
    }

    #[test]
    fn test_only_throttling_and_unavailability_are_retryable() {
        let retryable: Vec<FailureKind> = FailureKind::ALL
            .iter()
            .copied()
            .filter(FailureKind::is_retryable)
            .collect();
        assert_eq!(
            retryable,
            vec![FailureKind::RateLimited, FailureKind::ProviderUnavailable]
        );
    }

    #[test]
    fn test_failure_kind_parses_its_own_name() {
        for kind in FailureKind::ALL {
            assert_eq!(kind.as_str().parse::<FailureKind>().unwrap(), kind);
        }
        assert!("NotAKind".parse::<FailureKind>().is_err());
    }

    #[test]
    fn test_failure_kind_of_walks_context_chain() {
        let err = anyhow::Error::from(NotetionError::ContentRejected("policy".into()))
            .context("generation failed");
        assert_eq!(FailureKind::of(&err), Some(FailureKind::ContentRejected));

        let plain = anyhow::anyhow!("something else");
        assert_eq!(FailureKind::of(&plain), None);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: NotetionError = io_error.into();
        assert!(matches!(error, NotetionError::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NotetionError>();
    }
}

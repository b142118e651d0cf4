//! Base provider trait and common types for Notetion
//!
//! This module defines the Provider trait that every LLM backend implements,
//! along with request/response types and the helpers that classify backend
//! failures into the four provider failure kinds the rest of the crate
//! understands: authentication, rate limiting, unavailability, rejection.

use crate::error::{NotetionError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message structure for a completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::providers::Message;
    ///
    /// let msg = Message::user("Summarize this lecture");
    /// assert_eq!(msg.role, "user");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Token usage information from a completion
///
/// Tracks the number of tokens used in prompts and completions,
/// as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u64,
    /// Number of tokens in the completion
    pub completion_tokens: u64,
    /// Total tokens used (prompt + completion)
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A single, non-streaming completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier understood by the backend
    pub model: String,
    /// Conversation to complete
    pub messages: Vec<Message>,
    /// Sampling temperature, already validated to lie in [0, 1]
    pub temperature: f64,
    /// Optional cap on generated tokens
    pub max_tokens: Option<u32>,
}

/// Completion text with optional usage reported by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Generated text
    pub content: String,
    /// Token usage, when the backend reports it
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a response without usage information
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    /// Create a response with token usage
    pub fn with_usage(content: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            content: content.into(),
            usage: Some(usage),
        }
    }
}

/// Provider trait for LLM backends
///
/// Implementations must report failures as one of
/// `NotetionError::AuthenticationFailure`, `RateLimited`,
/// `ProviderUnavailable`, or `ContentRejected`; nothing above this trait
/// looks at backend-specific error shapes.
///
/// # Examples
///
/// ```no_run
/// use notetion::providers::{CompletionRequest, CompletionResponse, Provider};
/// use notetion::error::Result;
/// use async_trait::async_trait;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     fn name(&self) -> &'static str {
///         "echo"
///     }
///
///     async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
///         Ok(CompletionResponse::new(request.messages.last().map(|m| m.content.clone()).unwrap_or_default()))
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Completes the request
    ///
    /// # Errors
    ///
    /// Returns one of the four classified provider failures
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// Maps a non-success HTTP status and body to a provider failure
///
/// # Examples
///
/// ```
/// use notetion::providers::classify_status;
/// use notetion::error::NotetionError;
///
/// let err = classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
/// assert!(matches!(err, NotetionError::RateLimited(_)));
/// ```
pub fn classify_status(status: reqwest::StatusCode, body: &str) -> NotetionError {
    let detail = format!("{}: {}", status, body.trim());
    match status.as_u16() {
        401 | 403 => NotetionError::AuthenticationFailure(detail),
        429 => NotetionError::RateLimited(detail),
        408 | 500..=599 => NotetionError::ProviderUnavailable(detail),
        _ => NotetionError::ContentRejected(detail),
    }
}

/// Maps a transport-level failure (connect, timeout, reset) to a provider failure
pub fn classify_transport(err: &reqwest::Error) -> NotetionError {
    if let Some(status) = err.status() {
        return classify_status(status, &err.to_string());
    }
    NotetionError::ProviderUnavailable(err.to_string())
}

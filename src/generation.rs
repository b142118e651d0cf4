//! Generation client
//!
//! Wraps a [`Provider`] call for one session: validates the creativity
//! parameter, builds the note prompt, and retries `RateLimited` and
//! `ProviderUnavailable` failures with capped exponential backoff. Every
//! other failure is returned on the first occurrence.

use crate::config::RetryConfig;
use crate::error::{FailureKind, NotetionError, Result};
use crate::prompts;
use crate::providers::{CompletionRequest, Provider, TokenUsage};

use metrics::increment_counter;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Text produced by a successful generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    /// Generated note text
    pub text: String,
    /// Usage reported by the provider, if any
    pub usage: Option<TokenUsage>,
    /// Number of provider calls made, including the successful one
    pub attempts: u32,
}

/// Checks that a creativity value lies in `[0, 1]`
///
/// # Examples
///
/// ```
/// use notetion::generation::validate_creativity;
///
/// assert!(validate_creativity(0.2).is_ok());
/// assert!(validate_creativity(1.5).is_err());
/// assert!(validate_creativity(f64::NAN).is_err());
/// ```
pub fn validate_creativity(creativity: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&creativity) {
        return Err(NotetionError::InvalidParameter(format!(
            "creativity must be within [0, 1], got {}",
            creativity
        ))
        .into());
    }
    Ok(())
}

/// Provider wrapper with validation and retry
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn Provider>,
    retry: RetryConfig,
    max_output_tokens: Option<u32>,
}

impl GenerationClient {
    /// Create a client over the given provider
    pub fn new(provider: Arc<dyn Provider>, retry: RetryConfig) -> Self {
        Self {
            provider,
            retry,
            max_output_tokens: None,
        }
    }

    /// Caps the number of tokens requested from the provider
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Generates notes for `prompt_text`
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if `creativity` is outside `[0, 1]` or `model`
    ///   is blank; no provider call is made
    /// - `RateLimited` / `ProviderUnavailable` once `max_attempts` calls
    ///   have failed with retryable errors
    /// - `AuthenticationFailure` / `ContentRejected` immediately
    pub async fn generate(
        &self,
        prompt_text: &str,
        model: &str,
        creativity: f64,
    ) -> Result<GenerationOutput> {
        validate_creativity(creativity)?;
        if model.trim().is_empty() {
            return Err(NotetionError::InvalidParameter("model must not be empty".into()).into());
        }

        let request = CompletionRequest {
            model: model.to_string(),
            messages: prompts::build_messages(prompt_text),
            temperature: creativity,
            max_tokens: self.max_output_tokens,
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.provider.complete(&request).await {
                Ok(response) => {
                    tracing::debug!(
                        "Generation succeeded: model={}, attempts={}, chars={}",
                        model,
                        attempt,
                        response.content.chars().count()
                    );
                    return Ok(GenerationOutput {
                        text: response.content,
                        usage: response.usage,
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    let kind = FailureKind::of(&err);
                    let retryable = kind.map(|k| k.is_retryable()).unwrap_or(false);
                    if !retryable || attempt >= max_attempts {
                        tracing::error!(
                            "Generation failed: model={}, attempt={}/{}, error={}",
                            model,
                            attempt,
                            max_attempts,
                            err
                        );
                        return Err(err);
                    }

                    let delay = self.backoff(attempt);
                    if let Some(kind) = kind {
                        increment_counter!(
                            "notetion_generation_retries_total",
                            "model" => model.to_string(),
                            "kind" => kind.as_str()
                        );
                    }
                    tracing::warn!(
                        "Retryable generation failure (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        max_attempts,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Delay before retry number `attempt` (1-based)
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .retry
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.retry.max_backoff_ms);
        let jitter = if base >= 4 {
            rand::rng().random_range(0..=base / 4)
        } else {
            0
        };
        Duration::from_millis(base.saturating_add(jitter).min(self.retry.max_backoff_ms))
    }
}

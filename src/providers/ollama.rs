//! Ollama provider implementation for Notetion
//!
//! This module implements the Provider trait for Ollama, connecting to a local
//! or remote Ollama server through its non-streaming `/api/chat` endpoint.

use crate::config::OllamaConfig;
use crate::error::{NotetionError, Result};
use crate::providers::{
    classify_status, classify_transport, CompletionRequest, CompletionResponse, Message,
    Provider, TokenUsage,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama API provider
///
/// # Examples
///
/// ```no_run
/// use notetion::config::OllamaConfig;
/// use notetion::providers::{CompletionRequest, Message, OllamaProvider, Provider};
///
/// # async fn example() -> notetion::error::Result<()> {
/// let provider = OllamaProvider::new(OllamaConfig::default())?;
/// let request = CompletionRequest {
///     model: "llama3.2:latest".to_string(),
///     messages: vec![Message::user("Hello!")],
///     temperature: 0.3,
///     max_tokens: Some(512),
/// };
/// let completion = provider.complete(&request).await?;
/// # Ok(())
/// # }
/// ```
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

/// Request structure for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: OllamaOptions,
}

/// Sampling options for Ollama API
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Response structure from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("notetion/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                NotetionError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!("Initialized Ollama provider: host={}", config.host);

        Ok(Self { client, config })
    }

    /// Get the configured Ollama host
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::config::OllamaConfig;
    /// use notetion::providers::OllamaProvider;
    ///
    /// let provider = OllamaProvider::new(OllamaConfig::default()).unwrap();
    /// assert_eq!(provider.host(), "http://localhost:11434");
    /// ```
    pub fn host(&self) -> &str {
        &self.config.host
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));

        let ollama_request = OllamaRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        tracing::debug!(
            "Sending Ollama request: model={}, {} messages",
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                classify_transport(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            // Ollama answers 404 for models that are not pulled
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(NotetionError::ProviderUnavailable(format!(
                    "Ollama model not available: {}",
                    error_text
                ))
                .into());
            }
            return Err(classify_status(status, &error_text).into());
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            NotetionError::ProviderUnavailable(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(
            "Ollama response: done={}, prompt_tokens={}, completion_tokens={}",
            ollama_response.done,
            ollama_response.prompt_eval_count,
            ollama_response.eval_count
        );

        let content = ollama_response.message.content;
        let response = if ollama_response.prompt_eval_count > 0 || ollama_response.eval_count > 0 {
            let usage = TokenUsage::new(
                ollama_response.prompt_eval_count,
                ollama_response.eval_count,
            );
            CompletionResponse::with_usage(content, usage)
        } else {
            CompletionResponse::new(content)
        };

        Ok(response)
    }
}

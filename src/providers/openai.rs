//! OpenAI-compatible chat completions provider
//!
//! Talks to any server exposing `POST {api_base}/chat/completions` with the
//! OpenAI request and response shapes. HTTP and transport failures are
//! classified with the shared helpers in `providers::base`.

use crate::config::OpenAiConfig;
use crate::error::{NotetionError, Result};
use crate::providers::{
    classify_status, classify_transport, CompletionRequest, CompletionResponse, Message,
    Provider, TokenUsage,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Keyring service under which `notetion auth` stores the API key
pub const KEYRING_SERVICE: &str = "notetion";
/// Keyring user for the OpenAI API key
pub const KEYRING_USER: &str = "openai_api_key";

/// OpenAI-compatible provider
///
/// # Examples
///
/// ```no_run
/// use notetion::config::OpenAiConfig;
/// use notetion::providers::{CompletionRequest, Message, OpenAiProvider, Provider};
///
/// # async fn example() -> notetion::error::Result<()> {
/// let provider = OpenAiProvider::with_api_key(OpenAiConfig::default(), "sk-...")?;
/// let request = CompletionRequest {
///     model: "gpt-3.5-turbo".to_string(),
///     messages: vec![Message::user("Hello!")],
///     temperature: 0.2,
///     max_tokens: None,
/// };
/// let response = provider.complete(&request).await?;
/// # Ok(())
/// # }
/// ```
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl OpenAiProvider {
    /// Create a provider, resolving the API key from `OPENAI_API_KEY`, then
    /// the configuration, then the OS keyring
    ///
    /// A missing key is not an error here; requests fail with
    /// `AuthenticationFailure` before any network call.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config);
        Self::build(config, api_key)
    }

    /// Create a provider with an explicit API key
    pub fn with_api_key(config: OpenAiConfig, api_key: impl Into<String>) -> Result<Self> {
        Self::build(config, Some(api_key.into()))
    }

    fn build(config: OpenAiConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("notetion/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                NotetionError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized OpenAI-compatible provider: api_base={}, key_present={}",
            config.api_base,
            api_key.is_some()
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

fn resolve_api_key(config: &OpenAiConfig) -> Option<String> {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.trim().is_empty() {
            return Some(key);
        }
    }
    if let Some(key) = config.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        return Some(key.clone());
    }
    match keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).and_then(|e| e.get_password()) {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::debug!("No OpenAI API key in keyring: {}", e);
            None
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            NotetionError::AuthenticationFailure(
                "No OpenAI API key configured (set OPENAI_API_KEY or run `notetion auth`)"
                    .to_string(),
            )
        })?;

        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        tracing::debug!(
            "Sending chat completion: model={}, messages={}",
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("OpenAI request failed: {}", e);
                classify_transport(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI returned error {}: {}", status, error_text);
            return Err(classify_status(status, &error_text).into());
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse OpenAI response: {}", e);
            NotetionError::ProviderUnavailable(format!("Malformed completion response: {}", e))
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            NotetionError::ProviderUnavailable("Completion response has no choices".to_string())
        })?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(NotetionError::ContentRejected(
                "Completion stopped by the provider's content filter".to_string(),
            )
            .into());
        }

        let content = choice.message.content.unwrap_or_default();
        Ok(match parsed.usage {
            Some(usage) => CompletionResponse::with_usage(
                content,
                TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
            ),
            None => CompletionResponse::new(content),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = OpenAiConfig {
            api_base: "http://localhost:8080/v1/".to_string(),
            ..OpenAiConfig::default()
        };
        let provider = OpenAiProvider::with_api_key(config, "k").unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        // unroutable base: a network attempt would surface as ProviderUnavailable
        let config = OpenAiConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..OpenAiConfig::default()
        };
        let provider = OpenAiProvider::build(config, None).unwrap();
        let request = CompletionRequest {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("hi")],
            temperature: 0.5,
            max_tokens: None,
        };
        let err = provider.complete(&request).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NotetionError>(),
            Some(NotetionError::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_chat_request_serialization() {
        let messages = vec![Message::system("s"), Message::user("u")];
        let body = ChatRequest {
            model: "gpt-4",
            messages: &messages,
            temperature: 0.2,
            max_tokens: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"][1]["role"], "user");
        assert!(json.get("max_tokens").is_none());
    }
}

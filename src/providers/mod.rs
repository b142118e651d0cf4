//! Provider module for Notetion
//!
//! This module contains the LLM provider abstraction and implementations
//! for OpenAI-compatible servers and Ollama.

pub mod base;
pub mod ollama;
pub mod openai;

pub use base::{
    classify_status, classify_transport, CompletionRequest, CompletionResponse, Message,
    Provider, TokenUsage,
};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

#[cfg(test)]
pub use base::MockProvider;

use crate::config::ProviderConfig;
use crate::error::{NotetionError, Result};

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration; `provider_type` selects the backend
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
///
/// # Examples
///
/// ```no_run
/// use notetion::config::ProviderConfig;
/// use notetion::providers::create_provider;
///
/// # fn example() -> notetion::error::Result<()> {
/// let provider = create_provider(&ProviderConfig::default())?;
/// assert_eq!(provider.name(), "openai");
/// # Ok(())
/// # }
/// ```
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    match config.provider_type.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config.openai.clone())?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config.ollama.clone())?)),
        other => Err(NotetionError::Config(format!("Unknown provider type: {}", other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_invalid_type() {
        let config = ProviderConfig {
            provider_type: "invalid".to_string(),
            ..ProviderConfig::default()
        };

        let result = create_provider(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_provider_ollama() {
        let config = ProviderConfig {
            provider_type: "ollama".to_string(),
            ..ProviderConfig::default()
        };

        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }
}

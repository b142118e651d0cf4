//! Configuration management for Notetion
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! The resulting structs are passed explicitly into the orchestrator and
//! its collaborators; nothing reads configuration from global state.

use crate::error::{NotetionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure for Notetion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider configuration (OpenAI-compatible, Ollama)
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Workflow limits and defaults
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// Generation retry policy
    #[serde(default)]
    pub retry: RetryConfig,
    /// Model cost table
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Session store location
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Provider configuration
///
/// Specifies which LLM backend to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use ("openai" or "ollama")
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// OpenAI-compatible provider configuration
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
}

fn default_provider_type() -> String {
    "openai".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            openai: OpenAiConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

/// OpenAI-compatible chat completions configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API base URL (without the `/chat/completions` suffix)
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,

    /// API key. Prefer the `OPENAI_API_KEY` environment variable or the
    /// keyring entry written by `notetion auth`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_api_base(),
            api_key: None,
            timeout_seconds: default_request_timeout(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            timeout_seconds: default_request_timeout(),
        }
    }
}

/// Workflow limits and defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Model used when the caller does not pick one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Creativity used when the caller does not pick one
    #[serde(default = "default_creativity")]
    pub default_creativity: f64,

    /// Byte ceiling per input file
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Number of characters of normalized text kept as a file preview
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Upper bound on generated tokens requested from the provider
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_creativity() -> f64 {
    0.3
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50 MB
}

fn default_preview_chars() -> usize {
    500
}

fn default_max_output_tokens() -> u32 {
    4000
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_creativity: default_creativity(),
            max_file_size_bytes: default_max_file_size(),
            preview_chars: default_preview_chars(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// Retry policy for retryable generation failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on each subsequent retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Ceiling on a single backoff delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Per-1000-token rates for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRate {
    /// Currency units per 1000 input tokens
    pub input_per_1k: f64,
    /// Currency units per 1000 output tokens
    pub output_per_1k: f64,
}

/// Versioned cost table
///
/// Either inline (`models`) or loaded from `file`, which takes precedence
/// when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Version label of the cost table
    #[serde(default = "default_pricing_version")]
    pub version: String,

    /// Optional external YAML/JSON file holding `{version, models}`
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Inline model rates
    #[serde(default = "default_model_rates")]
    pub models: BTreeMap<String, ModelRate>,
}

fn default_pricing_version() -> String {
    "2024-01".to_string()
}

fn default_model_rates() -> BTreeMap<String, ModelRate> {
    let mut models = BTreeMap::new();
    models.insert(
        "gpt-4".to_string(),
        ModelRate {
            input_per_1k: 0.03,
            output_per_1k: 0.06,
        },
    );
    models.insert(
        "gpt-4-turbo".to_string(),
        ModelRate {
            input_per_1k: 0.01,
            output_per_1k: 0.03,
        },
    );
    models.insert(
        "gpt-3.5-turbo".to_string(),
        ModelRate {
            input_per_1k: 0.0015,
            output_per_1k: 0.002,
        },
    );
    models
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            version: default_pricing_version(),
            file: None,
            models: default_model_rates(),
        }
    }
}

/// Session store location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path; the platform data directory is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file, environment, and CLI
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed command line arguments
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NotetionError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| NotetionError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(provider_type) = std::env::var("NOTETION_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(model) = std::env::var("NOTETION_MODEL") {
            self.workflow.default_model = model;
        }

        if let Ok(api_base) = std::env::var("NOTETION_OPENAI_API_BASE") {
            self.provider.openai.api_base = api_base;
        }

        if let Ok(host) = std::env::var("NOTETION_OLLAMA_HOST") {
            self.provider.ollama.host = host;
        }

        if let Ok(max_size) = std::env::var("NOTETION_MAX_FILE_SIZE_BYTES") {
            if let Ok(value) = max_size.parse() {
                self.workflow.max_file_size_bytes = value;
            } else {
                tracing::warn!("Invalid NOTETION_MAX_FILE_SIZE_BYTES: {}", max_size);
            }
        }

        if let Ok(attempts) = std::env::var("NOTETION_MAX_ATTEMPTS") {
            if let Ok(value) = attempts.parse() {
                self.retry.max_attempts = value;
            } else {
                tracing::warn!("Invalid NOTETION_MAX_ATTEMPTS: {}", attempts);
            }
        }

        if let Ok(pricing_file) = std::env::var("NOTETION_PRICING_FILE") {
            self.pricing.file = Some(PathBuf::from(pricing_file));
        }

        if let Ok(db_path) = std::env::var("NOTETION_HISTORY_DB") {
            self.storage.path = Some(PathBuf::from(db_path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(db_path) = &cli.storage_path {
            self.storage.path = Some(PathBuf::from(db_path));
        }
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(NotetionError::Config("Provider type cannot be empty".to_string()).into());
        }

        let valid_providers = ["openai", "ollama"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(NotetionError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        for (name, base) in [
            ("provider.openai.api_base", &self.provider.openai.api_base),
            ("provider.ollama.host", &self.provider.ollama.host),
        ] {
            url::Url::parse(base).map_err(|e| {
                NotetionError::Config(format!("{} is not a valid URL ({}): {}", name, base, e))
            })?;
        }

        if self.workflow.max_file_size_bytes == 0 {
            return Err(NotetionError::Config(
                "workflow.max_file_size_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if !(0.0..=1.0).contains(&self.workflow.default_creativity) {
            return Err(NotetionError::Config(
                "workflow.default_creativity must be between 0.0 and 1.0".to_string(),
            )
            .into());
        }

        if self.retry.max_attempts == 0 {
            return Err(NotetionError::Config(
                "retry.max_attempts must be greater than 0".to_string(),
            )
            .into());
        }

        if self.retry.max_attempts > 10 {
            return Err(NotetionError::Config(
                "retry.max_attempts must be less than or equal to 10".to_string(),
            )
            .into());
        }

        if self.pricing.file.is_none() && self.pricing.models.is_empty() {
            return Err(NotetionError::Config(
                "pricing.models cannot be empty when no pricing.file is set".to_string(),
            )
            .into());
        }

        for (model, rate) in &self.pricing.models {
            if rate.input_per_1k < 0.0 || rate.output_per_1k < 0.0 {
                return Err(NotetionError::Config(format!(
                    "pricing for {} must not be negative",
                    model
                ))
                .into());
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            workflow: WorkflowConfig::default(),
            retry: RetryConfig::default(),
            pricing: PricingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

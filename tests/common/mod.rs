use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use notetion::config::{ModelRate, RetryConfig};
use notetion::error::{NotetionError, Result};
use notetion::estimator::{CostEstimator, PricingTable, Tokenizer};
use notetion::generation::GenerationClient;
use notetion::parser::DocumentParser;
use notetion::providers::{CompletionRequest, CompletionResponse, Provider};
use notetion::storage::SqliteStorage;
use notetion::workflow::Orchestrator;

/// Tokenizer that is never available, forcing the chars / 4 fallback
#[allow(dead_code)]
pub struct BrokenTokenizer;

impl Tokenizer for BrokenTokenizer {
    fn count(&self, _text: &str, model: &str) -> Result<u64> {
        anyhow::bail!("no encoding for {}", model)
    }
}

/// Tokenizer counting whitespace-separated words
#[allow(dead_code)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn count(&self, text: &str, _model: &str) -> Result<u64> {
        Ok(text.split_whitespace().count() as u64)
    }
}

/// Scripted reply for [`ScriptedProvider`]
#[allow(dead_code)]
pub enum Reply {
    Text(&'static str),
    RateLimited,
    Unavailable,
    Rejected,
    Auth,
}

/// Provider replaying a fixed script; repeats the last reply when exhausted
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Reply>>,
    fallback: &'static str,
    delay: Duration,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: "# Notes\n- point",
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(text: &'static str) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.fallback = text;
        provider
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.script.lock().unwrap().pop_front();
        match reply {
            None => Ok(CompletionResponse::new(self.fallback)),
            Some(Reply::Text(text)) => Ok(CompletionResponse::new(text)),
            Some(Reply::RateLimited) => Err(NotetionError::RateLimited("429".into()).into()),
            Some(Reply::Unavailable) => {
                Err(NotetionError::ProviderUnavailable("503".into()).into())
            }
            Some(Reply::Rejected) => Err(NotetionError::ContentRejected("policy".into()).into()),
            Some(Reply::Auth) => Err(NotetionError::AuthenticationFailure("401".into()).into()),
        }
    }
}

/// Pricing with `gpt-4` at 0.03 / 0.06 and `gpt-3.5-turbo` at 0.0015 / 0.002
#[allow(dead_code)]
pub fn test_pricing() -> PricingTable {
    let mut rates = BTreeMap::new();
    rates.insert(
        "gpt-4".to_string(),
        ModelRate {
            input_per_1k: 0.03,
            output_per_1k: 0.06,
        },
    );
    rates.insert(
        "gpt-3.5-turbo".to_string(),
        ModelRate {
            input_per_1k: 0.0015,
            output_per_1k: 0.002,
        },
    );
    PricingTable::new("test", rates)
}

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("history.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

/// Orchestrator over a temp store with fast retries
#[allow(dead_code)]
pub fn create_orchestrator(
    provider: Arc<dyn Provider>,
    tokenizer: Arc<dyn Tokenizer>,
) -> (Orchestrator, TempDir) {
    let (storage, tmp) = create_temp_storage();
    let retry = RetryConfig {
        max_attempts: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 4,
    };
    let orchestrator = Orchestrator::new(
        DocumentParser::new(1024 * 1024),
        CostEstimator::new(tokenizer, test_pricing()),
        GenerationClient::new(provider, retry),
        storage,
    );
    (orchestrator, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

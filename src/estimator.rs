//! Token counting and cost estimation
//!
//! Token counts come from a model-aware tokenizer when one is available and
//! fall back to a character-ratio heuristic otherwise. The result is tagged
//! so approximate counts are never mistaken for exact ones. Costs come from
//! a static, versioned pricing table; unknown models are an error rather
//! than a free ride.

use crate::config::{ModelRate, PricingConfig};
use crate::error::{NotetionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tiktoken_rs::CoreBPE;

/// Characters per token used by the fallback heuristic
pub const FALLBACK_CHARS_PER_TOKEN: usize = 4;

/// A token count and whether it came from the fallback heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenCount {
    /// Number of tokens
    pub tokens: u64,
    /// True when the count is `ceil(chars / 4)` rather than tokenizer-exact
    pub approximate: bool,
}

impl TokenCount {
    /// Exact, tokenizer-derived count
    pub fn exact(tokens: u64) -> Self {
        Self {
            tokens,
            approximate: false,
        }
    }

    /// Heuristic count for `text`
    ///
    /// # Examples
    ///
    /// ```
    /// use notetion::estimator::TokenCount;
    ///
    /// let count = TokenCount::approximate_for(&"a".repeat(801));
    /// assert_eq!(count.tokens, 201);
    /// assert!(count.approximate);
    /// ```
    pub fn approximate_for(text: &str) -> Self {
        Self {
            tokens: text.chars().count().div_ceil(FALLBACK_CHARS_PER_TOKEN) as u64,
            approximate: true,
        }
    }
}

/// Model-aware tokenizer
pub trait Tokenizer: Send + Sync {
    /// Count the tokens `model` would see for `text`
    ///
    /// # Errors
    ///
    /// Returns error if no encoding is known for the model
    fn count(&self, text: &str, model: &str) -> Result<u64>;
}

/// BPE tokenizer backed by `tiktoken-rs`
///
/// Encodings are loaded lazily and cached per model, since building a BPE
/// table is far more expensive than encoding a document.
#[derive(Default)]
pub struct TiktokenTokenizer {
    encodings: Mutex<HashMap<String, Arc<CoreBPE>>>,
}

impl TiktokenTokenizer {
    /// Create a tokenizer with an empty encoding cache
    pub fn new() -> Self {
        Self::default()
    }

    fn encoding_for(&self, model: &str) -> Result<Arc<CoreBPE>> {
        let mut cache = self
            .encodings
            .lock()
            .map_err(|_| anyhow::anyhow!("Tokenizer cache lock poisoned"))?;
        if let Some(bpe) = cache.get(model) {
            return Ok(Arc::clone(bpe));
        }
        let bpe = Arc::new(tiktoken_rs::get_bpe_from_model(model)?);
        cache.insert(model.to_string(), Arc::clone(&bpe));
        Ok(bpe)
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count(&self, text: &str, model: &str) -> Result<u64> {
        let bpe = self.encoding_for(model)?;
        Ok(bpe.encode_with_special_tokens(text).len() as u64)
    }
}

/// Estimated monetary cost of one session
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Cost attributed to input tokens
    pub input_cost: f64,
    /// Cost attributed to output tokens
    pub output_cost: f64,
}

impl CostEstimate {
    /// Sum of input and output cost
    pub fn total(&self) -> f64 {
        self.input_cost + self.output_cost
    }
}

#[derive(Debug, Deserialize)]
struct PricingFile {
    version: String,
    models: BTreeMap<String, ModelRate>,
}

/// Versioned mapping of model identifier to per-1000-token rates
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    version: String,
    rates: BTreeMap<String, ModelRate>,
}

impl PricingTable {
    /// Build a table from explicit rates
    pub fn new(version: impl Into<String>, rates: BTreeMap<String, ModelRate>) -> Self {
        Self {
            version: version.into(),
            rates,
        }
    }

    /// Build the table described by the configuration
    ///
    /// When `pricing.file` is set it replaces the inline table entirely.
    ///
    /// # Errors
    ///
    /// Returns error if the pricing file cannot be read or parsed
    pub fn from_config(config: &PricingConfig) -> Result<Self> {
        match &config.file {
            Some(path) => Self::from_file(path),
            None => Ok(Self::new(config.version.clone(), config.models.clone())),
        }
    }

    /// Load a `{version, models}` table from a YAML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NotetionError::Config(format!(
                "Failed to read pricing file {}: {}",
                path.display(),
                e
            ))
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let file: PricingFile = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };
        if file.models.is_empty() {
            return Err(NotetionError::Config(format!(
                "Pricing file {} defines no models",
                path.display()
            ))
            .into());
        }
        tracing::debug!(
            "Loaded pricing table {} with {} models from {}",
            file.version,
            file.models.len(),
            path.display()
        );
        Ok(Self::new(file.version, file.models))
    }

    /// Version label of this table
    pub fn version(&self) -> &str {
        &self.version
    }

    /// All configured models and their rates, sorted by model id
    pub fn models(&self) -> impl Iterator<Item = (&str, &ModelRate)> {
        self.rates.iter().map(|(name, rate)| (name.as_str(), rate))
    }

    /// Rates for `model`
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel`, naming the closest configured model when one
    /// is reasonably similar
    pub fn rate(&self, model: &str) -> Result<ModelRate> {
        self.rates.get(model).copied().ok_or_else(|| {
            NotetionError::UnknownModel {
                model: model.to_string(),
                suggestion: self.closest(model),
            }
            .into()
        })
    }

    fn closest(&self, model: &str) -> Option<String> {
        let threshold = (model.chars().count() / 3).max(3);
        self.rates
            .keys()
            .map(|candidate| (strsim::levenshtein(model, candidate), candidate))
            .filter(|(distance, _)| *distance <= threshold)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, candidate)| candidate.clone())
    }
}

/// Pure token and cost estimator
#[derive(Clone)]
pub struct CostEstimator {
    tokenizer: Arc<dyn Tokenizer>,
    pricing: Arc<PricingTable>,
}

impl CostEstimator {
    /// Create an estimator from a tokenizer and a pricing table
    pub fn new(tokenizer: Arc<dyn Tokenizer>, pricing: PricingTable) -> Self {
        Self {
            tokenizer,
            pricing: Arc::new(pricing),
        }
    }

    /// Estimator using the tiktoken tokenizer
    pub fn with_tiktoken(pricing: PricingTable) -> Self {
        Self::new(Arc::new(TiktokenTokenizer::new()), pricing)
    }

    /// The pricing table in use
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Count tokens, falling back to `ceil(chars / 4)` on tokenizer failure
    pub fn count_tokens(&self, text: &str, model: &str) -> TokenCount {
        match self.tokenizer.count(text, model) {
            Ok(tokens) => TokenCount::exact(tokens),
            Err(e) => {
                let fallback = TokenCount::approximate_for(text);
                tracing::debug!(
                    "Tokenizer unavailable for {} ({}); approximating {} tokens",
                    model,
                    e,
                    fallback.tokens
                );
                fallback
            }
        }
    }

    /// Estimate cost as `in/1000 * input_rate + out/1000 * output_rate`
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel` if the model has no configured rates
    pub fn estimate_cost(
        &self,
        input_tokens: u64,
        output_tokens: u64,
        model: &str,
    ) -> Result<CostEstimate> {
        let rate = self.pricing.rate(model)?;
        Ok(CostEstimate {
            input_cost: input_tokens as f64 / 1000.0 * rate.input_per_1k,
            output_cost: output_tokens as f64 / 1000.0 * rate.output_per_1k,
        })
    }
}

//! Notetion - document-to-notes pipeline library
//!
//! This library turns TXT, PDF and JSON documents into structured Markdown
//! notes through an LLM provider, and records every generation session in a
//! local SQLite store for history, export and analytics.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `parser`: Document normalization and content hashing
//! - `estimator`: Token counting and cost estimation against a pricing table
//! - `providers`: Provider abstraction and implementations (OpenAI, Ollama)
//! - `generation`: Provider calls with validation and retry
//! - `workflow`: Session state machine and orchestration
//! - `storage`: SQLite session store with export and import
//! - `analytics`: Aggregate statistics over the store
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use notetion::parser::DocumentKind;
//! use notetion::providers::create_provider;
//! use notetion::storage::SqliteStorage;
//! use notetion::workflow::{InputFile, Orchestrator};
//! use notetion::Config;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let storage = SqliteStorage::from_config(&config.storage)?;
//!     let provider = Arc::from(create_provider(&config.provider)?);
//!     let orchestrator = Orchestrator::from_config(&config, provider, storage)?;
//!
//!     let input = InputFile::new("lecture.txt", DocumentKind::Txt, b"Entropy...".to_vec());
//!     let result = orchestrator.run_session(vec![input], "gpt-4", 0.3).await?;
//!     println!("{}", result.note.unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod estimator;
pub mod generation;
pub mod notes;
pub mod parser;
pub mod prompts;
pub mod providers;
pub mod storage;
pub mod workflow;

// Re-export commonly used types
pub use analytics::{AnalyticsAggregator, AnalyticsSummary};
pub use config::Config;
pub use error::{FailureKind, NotetionError, Result};
pub use estimator::{CostEstimate, CostEstimator, PricingTable, TokenCount};
pub use generation::GenerationClient;
pub use parser::{DocumentKind, DocumentParser, ParsedDocument};
pub use storage::SqliteStorage;
pub use workflow::{InputFile, Orchestrator, SessionResult, SessionState};


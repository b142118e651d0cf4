//! Model listing command for Notetion
//!
//! Models are whatever the pricing table prices; a session with any other
//! model identifier fails with `UnknownModel`.

use crate::config::Config;
use crate::error::{NotetionError, Result};
use crate::estimator::PricingTable;
use prettytable::{row, Table};
use serde::Serialize;

/// One priced model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedModel {
    /// Model identifier
    pub name: String,
    /// Currency units per 1000 input tokens
    pub input_per_1k: f64,
    /// Currency units per 1000 output tokens
    pub output_per_1k: f64,
    /// Whether this is `workflow.default_model`
    pub is_default: bool,
}

/// Priced models in name order
///
/// # Errors
///
/// Returns error if the pricing table cannot be loaded
pub fn priced_models(config: &Config) -> Result<(String, Vec<PricedModel>)> {
    let pricing = PricingTable::from_config(&config.pricing)?;
    let models = pricing
        .models()
        .map(|(name, rate)| PricedModel {
            name: name.to_string(),
            input_per_1k: rate.input_per_1k,
            output_per_1k: rate.output_per_1k,
            is_default: name == config.workflow.default_model,
        })
        .collect();
    Ok((pricing.version().to_string(), models))
}

/// List models with configured pricing
///
/// # Arguments
///
/// * `config` - Configuration holding the pricing table
/// * `json` - Print JSON instead of a table
///
/// # Examples
///
/// ```no_run
/// use notetion::config::Config;
/// use notetion::commands::models::list_models;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::load("config/config.yaml", &Default::default())?;
/// list_models(&config, false)?;
/// # Ok(())
/// # }
/// ```
pub fn list_models(config: &Config, json: bool) -> Result<()> {
    let (version, models) = priced_models(config)?;
    tracing::info!("Listing {} priced models (table {})", models.len(), version);

    if json {
        let json = serde_json::to_string_pretty(&models).map_err(NotetionError::Serialization)?;
        println!("{}", json);
        return Ok(());
    }

    if models.is_empty() {
        println!("No models configured in pricing table {}", version);
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["Model Name", "Input / 1K", "Output / 1K", "Default"]);
    for model in &models {
        table.add_row(row![
            model.name,
            format!("${:.4}", model.input_per_1k),
            format!("${:.4}", model.output_per_1k),
            if model.is_default { "*" } else { "" }
        ]);
    }

    println!(
        "\nModels priced for provider {} (pricing table {}):\n",
        config.provider.provider_type, version
    );
    table.printstd();
    println!();
    Ok(())
}

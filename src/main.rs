//! Notetion - lecture notes from your documents
//!
#![doc = "Notetion - lecture notes from your documents"]
#![doc = "Main entry point for the Notetion command line."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notetion::cli::{Cli, Commands};
use notetion::commands;
use notetion::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Run {
            paths,
            model,
            creativity,
            output,
        } => {
            tracing::info!("Starting note generation");
            commands::run::run_notes(config, paths, model, creativity, output).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            let storage = commands::open_storage(&config)?;
            commands::history::handle_history(&storage, command)?;
            Ok(())
        }
        Commands::Export { format, output } => {
            let storage = commands::open_storage(&config)?;
            commands::export::export_sessions(&storage, format.into(), output)?;
            Ok(())
        }
        Commands::Import { file, format } => {
            let storage = commands::open_storage(&config)?;
            commands::export::import_sessions(&storage, &file, format.map(Into::into))?;
            Ok(())
        }
        Commands::Cleanup { days } => {
            let storage = commands::open_storage(&config)?;
            commands::export::cleanup(&storage, days)?;
            Ok(())
        }
        Commands::Analytics { json } => {
            let storage = commands::open_storage(&config)?;
            commands::analytics::show_analytics(&storage, json)?;
            Ok(())
        }
        Commands::Models { json } => {
            commands::models::list_models(&config, json)?;
            Ok(())
        }
        Commands::Auth { api_key } => {
            tracing::info!(
                "Starting authentication for provider: {}",
                config.provider.provider_type
            );
            commands::auth::authenticate(&config, api_key)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so notes printed on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "notetion=debug" } else { "notetion=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

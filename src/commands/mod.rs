/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `run`: generate notes from input documents
- `auth`: store the OpenAI API key in the keyring
- `history`: list, show, search and delete sessions
- `export`: export, import and retention cleanup
- `analytics`: aggregate statistics
- `models`: models with configured pricing
*/

use crate::config::Config;
use crate::error::{NotetionError, Result};
use crate::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod analytics;
pub mod export;
pub mod history;
pub mod models;

/// Open the session store named by the configuration
pub fn open_storage(config: &Config) -> Result<SqliteStorage> {
    SqliteStorage::from_config(&config.storage)
}

/// Run command
///
/// Collects input files, runs one session and prints or writes the notes.
pub mod r#run {
    use super::*;
    use crate::notes::normalize_markdown;
    use crate::parser::DocumentKind;
    use crate::providers::{create_provider, Provider};
    use crate::workflow::{InputFile, Orchestrator, SessionResult};
    use colored::Colorize;
    use tokio_util::sync::CancellationToken;
    use walkdir::WalkDir;

    /// Generate notes from the given files and directories
    ///
    /// Ctrl-C cancels the session; nothing is recorded in that case.
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `paths` - Files, or directories searched recursively for TXT/PDF/JSON
    /// * `model` - Model override; `workflow.default_model` otherwise
    /// * `creativity` - Creativity override; `workflow.default_creativity` otherwise
    /// * `output` - Markdown file to write; notes go to stdout when `None`
    ///
    /// # Errors
    ///
    /// Returns error if no input is found, the session is rejected or
    /// cancelled, or the session ends in a failure.
    pub async fn run_notes(
        config: Config,
        paths: Vec<PathBuf>,
        model: Option<String>,
        creativity: Option<f64>,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let files = collect_inputs(&paths, config.workflow.max_file_size_bytes)?;
        let model = model.unwrap_or_else(|| config.workflow.default_model.clone());
        let creativity = creativity.unwrap_or(config.workflow.default_creativity);

        let storage = open_storage(&config)?;
        let provider: Arc<dyn Provider> = Arc::from(create_provider(&config.provider)?);
        let orchestrator = Orchestrator::from_config(&config, provider, storage)?;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling session");
                trigger.cancel();
            }
        });

        println!(
            "Generating notes from {} file(s) with {}...\n",
            files.len(),
            model.cyan()
        );
        let result = orchestrator
            .run_session_with_cancel(files, &model, creativity, &cancel)
            .await;
        ctrl_c.abort();
        let result = result?;

        print_file_outcomes(&result);

        match &result.note {
            Some(note) if result.is_success() => {
                let notes = normalize_markdown(note);
                match &output {
                    Some(path) => {
                        std::fs::write(path, &notes)?;
                        println!("Notes written to {}", path.display().to_string().green());
                    }
                    None => println!("{}\n", notes),
                }
                print_session_footer(&result);
                Ok(())
            }
            _ => {
                print_session_footer(&result);
                let kind = result
                    .failure
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                Err(anyhow::anyhow!(
                    "Session {} failed ({}): {}",
                    result.session_id,
                    kind,
                    result.failure_detail.as_deref().unwrap_or_default()
                ))
            }
        }
    }

    /// Expand paths into input files
    ///
    /// Directories are walked recursively in name order and files with
    /// unsupported extensions are skipped. A file named explicitly must
    /// have a supported extension. Files larger than `max_bytes` are kept
    /// unread so the session records them as failed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` when no input file is found
    pub fn collect_inputs(paths: &[PathBuf], max_bytes: u64) -> Result<Vec<InputFile>> {
        let mut inputs = Vec::new();
        for path in paths {
            if path.is_dir() {
                for entry in WalkDir::new(path).sort_by_file_name() {
                    let entry = entry.map_err(|e| NotetionError::Io(e.into()))?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if DocumentKind::from_path(entry.path()).is_none() {
                        tracing::debug!("Skipping unsupported file {}", entry.path().display());
                        continue;
                    }
                    inputs.push(InputFile::from_path(entry.path(), max_bytes)?);
                }
            } else {
                inputs.push(InputFile::from_path(path, max_bytes)?);
            }
        }

        if inputs.is_empty() {
            return Err(NotetionError::InvalidParameter(
                "No TXT, PDF or JSON files found in the given paths".to_string(),
            )
            .into());
        }
        Ok(inputs)
    }

    fn print_file_outcomes(result: &SessionResult) {
        for outcome in &result.files {
            let record = &outcome.record;
            match record.failure {
                None => {
                    let mut line = format!(
                        "  {} {} ({} bytes)",
                        "✓".green(),
                        record.name,
                        record.size_bytes
                    );
                    if let Some(original) = &outcome.duplicate_of {
                        let note = format!("same content as {}", original);
                        line.push_str(&format!(" {}", note.yellow()));
                    }
                    println!("{}", line);
                }
                Some(kind) => println!(
                    "  {} {} {}",
                    "✗".red(),
                    record.name,
                    format!(
                        "{}: {}",
                        kind,
                        record.failure_detail.as_deref().unwrap_or_default()
                    )
                    .red()
                ),
            }
        }
        println!();
    }

    fn print_session_footer(result: &SessionResult) {
        let approx = if result.input_tokens.approximate || result.output_tokens.approximate {
            " (approximate)"
        } else {
            ""
        };
        let status = if result.is_success() {
            result.status.to_string().green()
        } else {
            result.status.to_string().red()
        };
        println!("Session:  {} [{}]", result.session_id.cyan(), status);
        println!(
            "Tokens:   {} input / {} output{}",
            result.input_tokens.tokens, result.output_tokens.tokens, approx
        );
        println!("Cost:     ${:.4}", result.total_cost());
        println!(
            "Duration: {:.1}s",
            (result.ended_at - result.started_at).num_milliseconds() as f64 / 1000.0
        );
    }

}

/// Auth command
///
/// Stores the OpenAI API key in the system keyring, where the OpenAI
/// provider looks for it when neither `OPENAI_API_KEY` nor the configuration
/// supplies one.
pub mod auth {
    use super::*;
    use crate::providers::openai::{KEYRING_SERVICE, KEYRING_USER};
    use std::io::BufRead;

    /// Save the API key, prompting on stdin when `api_key` is `None`
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration
    /// * `api_key` - Key to store
    pub fn authenticate(config: &Config, api_key: Option<String>) -> Result<()> {
        if config.provider.provider_type == "ollama" {
            println!("Ollama needs no API key; make sure `provider.ollama.host` is set.");
            return Ok(());
        }

        let key = match api_key {
            Some(key) => key,
            None => {
                println!("Paste your OpenAI API key and press Enter:");
                let mut line = String::new();
                std::io::stdin().lock().read_line(&mut line)?;
                line
            }
        };
        let key = validate_key(&key)?;

        let entry =
            keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).map_err(NotetionError::from)?;
        entry.set_password(key).map_err(NotetionError::from)?;
        tracing::info!("Stored OpenAI API key in keyring service {}", KEYRING_SERVICE);
        println!("OpenAI API key saved to the system keyring.");
        Ok(())
    }

    fn validate_key(key: &str) -> Result<&str> {
        let key = key.trim();
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(NotetionError::InvalidParameter(
                "API key must be a single non-empty token".to_string(),
            )
            .into());
        }
        Ok(key)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_validate_key_trims() {
            assert_eq!(validate_key("  sk-abc\n").unwrap(), "sk-abc");
        }

        #[test]
        fn test_validate_key_rejects_blank_and_spaces() {
            assert!(validate_key("   ").is_err());
            assert!(validate_key("sk abc").is_err());
        }

        #[test]
        fn test_auth_ollama_needs_no_key() {
            let mut cfg = Config::default();
            cfg.provider.provider_type = "ollama".to_string();
            assert!(authenticate(&cfg, None).is_ok());
        }
    }
}

/// Default export file name, `notetion_export_YYYYmmdd_HHMMSS.<ext>`
pub(crate) fn default_export_path(extension: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    Path::new(".").join(format!("notetion_export_{}.{}", stamp, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_export_path_shape() {
        let path = default_export_path("csv");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("notetion_export_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "notetion_export_20240101_120000.csv".len());
    }
}

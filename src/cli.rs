//! Command-line interface definition for Notetion
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for generating notes, browsing session history,
//! exporting and importing records, and viewing analytics.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::storage::ExportFormat;

/// Notetion - lecture notes from your documents
///
/// Turns TXT, PDF and JSON documents into structured Markdown notes and
/// keeps a local history of every generation session.
#[derive(Parser, Debug, Clone)]
#[command(name = "notetion")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the session database path
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Notetion
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Generate notes from one or more documents
    Run {
        /// Input files or directories (TXT, PDF, JSON)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Model to use (defaults to workflow.default_model)
        #[arg(short, long)]
        model: Option<String>,

        /// Creativity between 0 and 1 (defaults to workflow.default_creativity)
        #[arg(long)]
        creativity: Option<f64>,

        /// Write the notes to a Markdown file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Browse recorded sessions
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Export every session to CSV or JSON
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = FormatArg::Json)]
        format: FormatArg,

        /// Output file (defaults to a timestamped name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import sessions from a previous export
    Import {
        /// Export file to read
        file: PathBuf,

        /// Input format (defaults to the file extension)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Delete sessions older than the retention window
    Cleanup {
        /// Retention window in days
        #[arg(short, long, default_value_t = 90)]
        days: u32,
    },

    /// Show aggregate statistics
    Analytics {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List models with configured pricing
    Models {
        /// Print the pricing table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store the OpenAI API key in the system keyring
    Auth {
        /// API key; read from stdin when omitted
        #[arg(long)]
        api_key: Option<String>,
    },
}

/// Session history subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List recent sessions
    List {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show one session with its files and note
    Show {
        /// Session id or unique id prefix
        id: String,
    },

    /// Search sessions
    Search {
        /// Text to find in notes or file names
        #[arg(short, long)]
        query: Option<String>,

        /// Only sessions using this model
        #[arg(short, long)]
        model: Option<String>,

        /// Only sessions with this status (running, succeeded, failed)
        #[arg(short, long)]
        status: Option<String>,

        /// Sessions started on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Sessions started on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Delete a session and everything recorded with it
    Delete {
        /// Session id or unique id prefix
        id: String,
    },
}

/// Export file format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            command: Commands::Models { json: false },
        }
    }
}

//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dedux_core::Settings;

/// Dedux - Thai tax-deduction assistant
#[derive(Parser)]
#[command(name = "dedux")]
#[command(about = "Self-hosted Thai tax-deduction receipt assistant", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Tax year for rule seeding and lookups (defaults to DEDUX_TAX_YEAR
    /// or the current calendar year)
    #[arg(long, global = true)]
    pub tax_year: Option<i32>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set DEDUX_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolved settings with CLI flag overrides applied
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::from_env();
        if let Some(year) = self.tax_year {
            settings = settings.with_tax_year(year);
        }
        settings
    }

    /// Database path: --db wins over the settings default
    pub fn db_path(&self, settings: &Settings) -> PathBuf {
        self.db.clone().unwrap_or_else(|| settings.db_path())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed deduction rules
    Init,

    /// Ingest documents into the tax knowledge base
    Ingest {
        /// Files to ingest (markdown or plain text)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Process a receipt image through the deduction pipeline
    Process {
        /// Receipt image file (JPEG or PNG)
        image: PathBuf,

        /// Print the full run result as JSON
        #[arg(long)]
        json: bool,

        /// Reasoning model to use (default: OLLAMA_MODEL or llama3.2)
        #[arg(long)]
        model: Option<String>,
    },

    /// Ask a free-text tax question
    Ask {
        /// Question to ask, e.g. "How much can I deduct for donations?"
        question: String,

        /// Reasoning model to use (default: OLLAMA_MODEL or llama3.2)
        #[arg(long)]
        model: Option<String>,
    },

    /// Manage deduction rules
    Rules {
        #[command(subcommand)]
        action: Option<RulesAction>,
    },

    /// Manage recorded transactions (list, show, delete)
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Manage AI prompts (list available prompts, view override status)
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Show database and model server status
    Status,

    /// Start the web server
    Serve {
        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// List deduction rules
    List {
        /// Only show rules for this tax year
        #[arg(long)]
        year: Option<i32>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (e.g., extract_receipt, classify_deduction)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List recorded transactions
    List {
        /// Filter by status (verified, needs_review, not_deductible, rejected)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show a transaction in full
    Show {
        /// Transaction ID
        id: i64,
    },

    /// Delete a transaction
    Delete {
        /// Transaction ID
        id: i64,
    },
}

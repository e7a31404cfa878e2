//! Dedux CLI - Thai tax-deduction assistant
//!
//! Usage:
//!   dedux init                  Initialize database and seed rules
//!   dedux ingest docs/*.md      Ingest tax knowledge documents
//!   dedux process receipt.jpg   Run a receipt through the pipeline
//!   dedux ask "..."             Ask a tax question
//!   dedux serve --port 3000     Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let settings = cli.settings();
    let db_path = cli.db_path(&settings);

    match cli.command {
        Commands::Init => commands::cmd_init(&db_path, &settings, cli.no_encrypt),
        Commands::Ingest { files } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_ingest(&db, &files)
        }
        Commands::Process { image, json, model } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_process(&db, &settings, &image, json, model.as_deref()).await
        }
        Commands::Ask { question, model } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_ask(&db, &settings, &question, model.as_deref()).await
        }
        Commands::Rules { action } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            match action {
                None | Some(RulesAction::List { year: None }) => {
                    commands::cmd_rules_list(&db, None)
                }
                Some(RulesAction::List { year }) => commands::cmd_rules_list(&db, year),
            }
        }
        Commands::Transactions { action } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            match action {
                None => commands::cmd_transactions_list(&db, None),
                Some(TransactionsAction::List { status }) => {
                    commands::cmd_transactions_list(&db, status.as_deref())
                }
                Some(TransactionsAction::Show { id }) => commands::cmd_transactions_show(&db, id),
                Some(TransactionsAction::Delete { id }) => {
                    commands::cmd_transactions_delete(&db, id)
                }
            }
        }
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
        Commands::Status => commands::cmd_status(&db_path, &settings, cli.no_encrypt).await,
        Commands::Serve { port, host } => {
            commands::cmd_serve(&db_path, &settings, &host, port, cli.no_encrypt).await
        }
    }
}

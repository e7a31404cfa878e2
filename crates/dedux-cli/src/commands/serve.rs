//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use dedux_core::Settings;
use dedux_server::{ServerConfig, API_TOKEN_ENV};

use super::{open_db, require_reasoner};

pub async fn cmd_serve(
    db_path: &Path,
    settings: &Settings,
    host: &str,
    port: u16,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Dedux web server...");
    println!("   Database: {}", db_path.display());
    println!("   Tax year: {}", settings.tax_year);
    println!("   Listening: http://{}:{}", host, port);

    let config = ServerConfig::from_env();
    if config.api_tokens.is_empty() {
        println!();
        println!(
            "   ⚠️  No API token configured ({}) - do not expose to a network!",
            API_TOKEN_ENV
        );
    } else {
        println!(
            "   🔑 API tokens: {} configured ({})",
            config.api_tokens.len(),
            API_TOKEN_ENV
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    // Ensure deduction rules are seeded (idempotent)
    db.seed_default_rules(settings.tax_year)
        .context("Failed to seed deduction rules")?;

    let reasoner = require_reasoner()?;

    dedux_server::serve_with_config(db, reasoner, settings, host, port, config).await?;

    Ok(())
}

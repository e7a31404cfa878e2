//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `require_reasoner` - Shared utility to resolve the model backend
//! - `cmd_init` - Initialize the database and seed rules

use std::path::Path;

use anyhow::{Context, Result};
use dedux_core::{Database, ReasonerClient, Settings};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Resolve the model backend from the environment, or fail with a hint
pub fn require_reasoner() -> Result<ReasonerClient> {
    ReasonerClient::from_env().context(
        "No model server configured. Set OLLAMA_HOST to your Ollama instance \
        (and optionally OLLAMA_MODEL, OLLAMA_VISION_MODEL).",
    )
}

pub fn cmd_init(db_path: &Path, settings: &Settings, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
    }

    let db = open_db(db_path, no_encrypt)?;

    // Seed default deduction rules for the configured tax year
    let seeded = db
        .seed_default_rules(settings.tax_year)
        .context("Failed to seed deduction rules")?;
    if seeded > 0 {
        println!(
            "   Seeded {} deduction rules for tax year {}",
            seeded, settings.tax_year
        );
    } else {
        println!(
            "   Deduction rules for tax year {} already present",
            settings.tax_year
        );
    }

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Ingest tax documents: dedux ingest docs/*.md");
    println!("  2. Process a receipt: dedux process receipt.jpg");
    println!("  3. Start the web API: dedux serve");

    Ok(())
}

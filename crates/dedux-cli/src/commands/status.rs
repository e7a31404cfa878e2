//! Status command implementation

use std::path::Path;

use anyhow::Result;
use dedux_core::{Reasoner, ReasonerClient, Settings};

use super::open_db;

pub async fn cmd_status(db_path: &Path, settings: &Settings, no_encrypt: bool) -> Result<()> {
    use dedux_core::db::DB_KEY_ENV;
    use std::fs;

    println!();
    println!("📊 Dedux Status");
    println!("   ─────────────────────────────────────────────────────────────");

    // Database path and size
    println!("   Database: {}", db_path.display());
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }
    println!("   Tax year: {}", settings.tax_year);

    // Check encryption status
    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    // Try to open the database and show stats
    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                println!();
                if let Ok(n) = db.count_transactions() {
                    println!("   Transactions: {}", n);
                }
                if let Ok(n) = db.count_chunks() {
                    println!("   Knowledge chunks: {}", n);
                }
                if let Ok(rules) = db.list_rules(Some(settings.tax_year)) {
                    println!("   Rules for {}: {}", settings.tax_year, rules.len());
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    // Model server reachability
    println!();
    match ReasonerClient::from_env() {
        Some(reasoner) => {
            if reasoner.health_check().await {
                println!(
                    "   ✅ Model server connected: {} (model: {})",
                    reasoner.host(),
                    reasoner.model()
                );
            } else {
                println!("   ⚠️  Model server not responding: {}", reasoner.host());
            }
        }
        None => {
            println!("   💡 Tip: Set OLLAMA_HOST to enable receipt processing and Q&A");
        }
    }

    println!();
    Ok(())
}

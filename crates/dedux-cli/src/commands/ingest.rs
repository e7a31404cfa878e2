//! Knowledge-base ingestion command

use std::path::PathBuf;

use anyhow::{Context, Result};
use dedux_core::{Database, SqliteKnowledgeBase};

pub fn cmd_ingest(db: &Database, files: &[PathBuf]) -> Result<()> {
    let kb = SqliteKnowledgeBase::new(db.clone());

    println!("📚 Ingesting into the tax knowledge base...");

    let mut total = 0;
    for file in files {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        // Re-ingesting a file replaces its earlier chunks, keyed by file name
        let source = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        let chunks = kb.ingest(&source, &content)?;
        println!("   📄 {} ({} chunks)", source, chunks);
        total += chunks;
    }

    println!();
    println!("✅ Ingested {} chunks from {} file(s)", total, files.len());

    Ok(())
}

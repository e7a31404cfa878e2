//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init) and shared utilities (open_db)
//! - `ingest` - Knowledge-base ingestion commands
//! - `pipeline` - Receipt processing and tax Q&A commands
//! - `prompts` - Prompt inspection commands (list, show, path)
//! - `rules` - Deduction rule commands
//! - `serve` - Web server command
//! - `status` - Status command
//! - `transactions` - Transaction commands (list, show, delete)

pub mod core;
pub mod ingest;
pub mod pipeline;
pub mod prompts;
pub mod rules;
pub mod serve;
pub mod status;
pub mod transactions;

// Re-export command functions for main.rs
pub use core::*;
pub use ingest::*;
pub use pipeline::*;
pub use prompts::*;
pub use rules::*;
pub use serve::*;
pub use status::*;
pub use transactions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
///
/// Counts characters rather than bytes so Thai merchant names are cut at
/// character boundaries.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

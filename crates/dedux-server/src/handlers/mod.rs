//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod health;
pub mod pipeline;
pub mod rules;
pub mod transactions;

// Re-export all handlers for use in router
pub use health::*;
pub use pipeline::*;
pub use rules::*;
pub use transactions::*;

//! Dedux Core Library
//!
//! Shared functionality for the Dedux Thai tax-deduction assistant:
//! - Encrypted SQLite persistence for tax rules, transactions, and the
//!   knowledge base
//! - Vision extraction of receipt fields via a pluggable local reasoner
//! - Receipt validation and the human-input routing decision
//! - Keyword-overlap knowledge base retrieval with multi-query merging
//! - Deduction classification with rate-limit-aware retry
//! - The pure deduction calculator (caps and donation multipliers)
//! - Transaction recording with the review-status ladder
//! - The receipt pipeline state machine
//! - Free-text tax Q&A over the knowledge base
//! - Prompt library for customizable model prompts

pub mod advisor;
pub mod ai;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod images;
pub mod kb;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod recorder;
pub mod retry;
pub mod rules;
pub mod validate;

/// Test utilities including the mock model server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use advisor::Advisor;
pub use ai::{MockReasoner, OllamaReasoner, Reasoner, ReasonerClient};
pub use classify::Classifier;
pub use config::{Settings, DEFAULT_USER_ID};
pub use db::Database;
pub use error::{Error, Result};
pub use images::ImageStore;
pub use kb::{
    KnowledgeClient, KnowledgeSource, MemoryKnowledgeBase, Retriever, SqliteKnowledgeBase,
};
pub use models::{
    Classification, Deduction, DeductionRule, NewTransaction, ReceiptData, RecordOutcome,
    RecordedTransaction, TextChunk, Transaction, TransactionStatus, TransactionUpdate,
};
pub use pipeline::{Pipeline, PipelineRequest, PipelineState, RunStatus, Stage};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use recorder::TransactionRecorder;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use rules::compute_deduction;
pub use validate::{validate_receipt, Routing};

//! Receipt deduction classification.
//!
//! Builds the classification prompt from the receipt fields and the
//! retrieved knowledge base context, calls the text model with bounded
//! retry on rate limiting, and parses the reply. Classification never
//! returns an error: every failure mode degrades to a non-deductible
//! result whose reasoning names the cause, so the pipeline always has
//! something to record.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, error, warn};

use crate::ai::parsing::parse_classification;
use crate::ai::{Reasoner, ReasonerClient};
use crate::error::{Error, Result};
use crate::models::{Classification, ReceiptData};
use crate::prompts::{PromptId, PromptLibrary};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::rules::CATEGORY_CAPS;

/// Reasoning attached when retrieval found no context to classify against.
pub const EMPTY_CONTEXT_REASONING: &str = "No relevant tax rules found in the knowledge base.";
/// Reasoning attached when the model reply carried no parsable JSON.
pub const PARSE_FAILURE_REASONING: &str = "Failed to parse tax analysis response.";
/// Reasoning attached when generation failed outright.
pub const ANALYSIS_ERROR_REASONING: &str = "An error occurred during tax analysis.";

/// Classifies receipts against retrieved tax-rule context.
#[derive(Clone)]
pub struct Classifier {
    reasoner: ReasonerClient,
    prompts: Arc<RwLock<PromptLibrary>>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    tax_year: i32,
}

impl Classifier {
    pub fn new(
        reasoner: ReasonerClient,
        prompts: Arc<RwLock<PromptLibrary>>,
        tax_year: i32,
    ) -> Self {
        Self {
            reasoner,
            prompts,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            tax_year,
        }
    }

    /// Replace the retry policy (tests shrink the delays).
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the backoff timer (tests record instead of sleeping).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Classify a receipt given the retrieved context text.
    ///
    /// An empty context skips the model call entirely. Rate limiting is
    /// the only retried failure; anything else falls through to the
    /// analysis-error fallback on the first occurrence.
    pub async fn classify(&self, receipt: &ReceiptData, context: &str) -> Classification {
        if context.trim().is_empty() {
            debug!("No knowledge base context, skipping tax analysis");
            return Classification::fallback(EMPTY_CONTEXT_REASONING);
        }

        let prompt = match self.render_prompt(receipt, context) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!(error = %e, "Failed to render classification prompt");
                return Classification::fallback(ANALYSIS_ERROR_REASONING);
            }
        };

        match self.generate_with_retry(&prompt).await {
            Ok(reply) => match parse_classification(&reply) {
                Ok(classification) => classification,
                Err(e) => {
                    warn!(error = %e, "Could not parse classification reply");
                    Classification::fallback(PARSE_FAILURE_REASONING)
                }
            },
            Err(e) => {
                error!(error = %e, "Tax analysis generation failed");
                Classification::fallback(ANALYSIS_ERROR_REASONING)
            }
        }
    }

    fn render_prompt(&self, receipt: &ReceiptData, context: &str) -> Result<String> {
        let tax_year = self.tax_year.to_string();
        let date = receipt.date.map(|d| d.to_string()).unwrap_or_default();
        let amount = receipt
            .amount
            .map(|a| format!("{a:.2}"))
            .unwrap_or_default();
        let category_rules = category_rules_text();

        let mut vars = HashMap::new();
        vars.insert("tax_year", tax_year.as_str());
        vars.insert("date", date.as_str());
        vars.insert("amount", amount.as_str());
        vars.insert("merchant", receipt.merchant_or_default());
        vars.insert("context", context);
        vars.insert("category_rules", category_rules.as_str());

        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
        let template = prompts.get(PromptId::ClassifyDeduction)?;
        Ok(template.render(&vars))
    }

    async fn generate_with_retry(&self, prompt: &str) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.reasoner.generate(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_rate_limit() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_before_retry(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Model server rate limited, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Category list given to the model, one line per seeded rule.
fn category_rules_text() -> String {
    CATEGORY_CAPS
        .iter()
        .map(|(name, cap)| {
            if *cap > 0.0 {
                format!("- {name} (limit {cap:.0} THB)")
            } else {
                format!("- {name} (no fixed limit)")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

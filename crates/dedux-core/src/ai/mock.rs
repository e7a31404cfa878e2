//! Mock backend for testing
//!
//! Provides predictable responses for extraction and generation without a
//! running model server. Responses can be scripted per-call for retry and
//! failure tests; with no script, keyword-based defaults apply.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::models::ReceiptData;

use super::Reasoner;

/// Mock reasoner for testing
///
/// `generate` pops scripted results first; with an empty script it answers
/// from prompt keywords (hospital/insurance prompts classify as Health
/// Insurance, donation prompts as general donations, everything else as
/// not deductible). `extract_receipt` returns a configurable receipt.
#[derive(Clone, Default)]
pub struct MockReasoner {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Receipt returned by extract_receipt (None = built-in sample)
    receipt: Option<ReceiptData>,
    /// When set, extract_receipt fails with this message
    extraction_failure: Option<String>,
    /// Scripted generate results, popped front first
    generate_script: Arc<Mutex<VecDeque<Result<String>>>>,
}

impl MockReasoner {
    /// Create a new mock reasoner (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Self::default()
        }
    }

    /// Create an unhealthy mock reasoner
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::default()
        }
    }

    /// Create a new instance with a different model (no-op for mock)
    pub fn with_model(&self, _model: &str) -> Self {
        self.clone()
    }

    /// Set the receipt returned by extract_receipt
    pub fn with_receipt(mut self, receipt: ReceiptData) -> Self {
        self.receipt = Some(receipt);
        self
    }

    /// Make extract_receipt fail with the given message
    pub fn with_extraction_failure(mut self, message: &str) -> Self {
        self.extraction_failure = Some(message.to_string());
        self
    }

    /// Queue a scripted generate result
    pub fn push_generate(&self, result: Result<String>) {
        self.generate_script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(result);
    }

    /// Queue a rate-limit error followed by nothing (next call pops it)
    pub fn push_rate_limited(&self) {
        self.push_generate(Err(Error::RateLimited));
    }

    /// Built-in sample receipt: a readable hospital receipt
    pub fn sample_receipt() -> ReceiptData {
        ReceiptData {
            date: NaiveDate::from_ymd_opt(2025, 1, 15),
            amount: Some(18_000.0),
            tax_id: Some("0105536112014".to_string()),
            merchant_name: Some("Bangkok Hospital".to_string()),
            error: None,
        }
    }

    fn default_generate(&self, prompt: &str) -> String {
        let lower = prompt.to_lowercase();
        if lower.contains("hospital") || lower.contains("insurance") {
            r#"{"is_deductible": true, "category": "Health Insurance", "reasoning": "Medical insurance premium paid to a hospital."}"#
                .to_string()
        } else if lower.contains("donation") || lower.contains("foundation") {
            r#"{"is_deductible": true, "category": "Donation (General)", "reasoning": "Charitable donation to a registered foundation."}"#
                .to_string()
        } else if lower.contains("question:") {
            "Under current rules this deduction applies within its annual cap.".to_string()
        } else {
            r#"{"is_deductible": false, "category": "None", "reasoning": "Purchase does not match a deduction category."}"#
                .to_string()
        }
    }
}

#[async_trait]
impl Reasoner for MockReasoner {
    async fn extract_receipt(&self, _image: &[u8]) -> Result<ReceiptData> {
        if let Some(ref message) = self.extraction_failure {
            return Err(Error::InvalidData(message.clone()));
        }
        Ok(self
            .receipt
            .clone()
            .unwrap_or_else(Self::sample_receipt))
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let scripted = self
            .generate_script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(self.default_generate(prompt)),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_results_pop_in_order() {
        let mock = MockReasoner::new();
        mock.push_rate_limited();
        mock.push_generate(Ok("second".to_string()));

        assert!(matches!(
            mock.generate("anything").await,
            Err(Error::RateLimited)
        ));
        assert_eq!(mock.generate("anything").await.unwrap(), "second");
        // Script drained: falls back to keyword defaults
        let text = mock.generate("hospital bill").await.unwrap();
        assert!(text.contains("Health Insurance"));
    }

    #[tokio::test]
    async fn test_extraction_failure() {
        let mock = MockReasoner::new().with_extraction_failure("blurry image");
        assert!(mock.extract_receipt(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_default_receipt_is_sample() {
        let mock = MockReasoner::new();
        let receipt = mock.extract_receipt(&[1, 2, 3]).await.unwrap();
        assert_eq!(receipt.merchant_name.as_deref(), Some("Bangkok Hospital"));
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let healthy = MockReasoner::new();
        assert!(healthy.health_check().await);

        let unhealthy = MockReasoner::unhealthy();
        assert!(!unhealthy.health_check().await);
    }
}

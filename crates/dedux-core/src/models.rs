//! Domain models for dedux

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Category name used when a receipt matches no deduction category.
pub const CATEGORY_NONE: &str = "None";

/// Merchant name used when extraction could not read one.
pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";

/// Structured fields extracted from a receipt image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptData {
    /// Transaction date, if the extractor could read and parse one
    pub date: Option<NaiveDate>,
    /// Total amount in THB
    pub amount: Option<f64>,
    /// Merchant tax identifier (13-digit Thai TIN when readable)
    pub tax_id: Option<String>,
    pub merchant_name: Option<String>,
    /// Extraction-error marker. When set, the validator routes the run to
    /// human input instead of classification.
    pub error: Option<String>,
}

impl ReceiptData {
    /// A receipt carrying only an extraction-error marker
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Merchant name with the extraction default applied
    pub fn merchant_or_default(&self) -> &str {
        self.merchant_name.as_deref().unwrap_or(UNKNOWN_MERCHANT)
    }
}

/// Deduction classification produced by the tax analysis model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub is_deductible: bool,
    /// Category name. Nominally one of the seeded category set plus the
    /// "None" sentinel, but unknown strings are carried through and
    /// resolved (or not) by rule lookup.
    pub category: String,
    pub reasoning: String,
}

impl Classification {
    /// The non-deductible fallback with a cause-specific reasoning string
    pub fn fallback(reasoning: impl Into<String>) -> Self {
        Self {
            is_deductible: false,
            category: CATEGORY_NONE.to_string(),
            reasoning: reasoning.into(),
        }
    }
}

/// A deduction rule for one category in one tax year
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionRule {
    pub id: i64,
    pub category_name: String,
    /// Maximum deductible amount in THB. Zero means no fixed cap; the
    /// calculator applies the category multiplier instead.
    pub max_limit: f64,
    pub tax_year: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Result of the deduction calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub amount: f64,
    pub is_capped: bool,
    pub max_limit: f64,
}

/// A recorded receipt transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    /// The deduction rule applied, when one resolved
    pub rule_id: Option<i64>,
    /// Content-addressed reference to the stored receipt image
    pub receipt_image: Option<String>,
    pub merchant_name: String,
    /// May be empty when the receipt carried no readable tax ID
    pub merchant_tax_id: String,
    pub transaction_date: NaiveDate,
    pub total_amount: f64,
    pub deductible_amount: f64,
    pub status: TransactionStatus,
    pub ai_reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A transaction to be recorded (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: String,
    pub rule_id: Option<i64>,
    pub receipt_image: Option<String>,
    pub merchant_name: String,
    pub merchant_tax_id: String,
    pub transaction_date: NaiveDate,
    pub total_amount: f64,
    pub deductible_amount: f64,
    pub status: TransactionStatus,
    pub ai_reasoning: Option<String>,
}

/// Review status of a recorded transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// All fields read cleanly and a rule applied
    Verified,
    /// Needs a human look (no matching rule, or manual entry)
    #[default]
    NeedsReview,
    /// Classified as not deductible
    NotDeductible,
    /// Rejected by a reviewer
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::NeedsReview => "needs_review",
            Self::NotDeductible => "not_deductible",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "verified" => Ok(Self::Verified),
            "needs_review" => Ok(Self::NeedsReview),
            "not_deductible" => Ok(Self::NotDeductible),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Partial update for a recorded transaction
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionUpdate {
    pub merchant_name: Option<String>,
    pub merchant_tax_id: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub total_amount: Option<f64>,
    pub status: Option<TransactionStatus>,
}

impl TransactionUpdate {
    pub fn is_empty(&self) -> bool {
        self.merchant_name.is_none()
            && self.merchant_tax_id.is_none()
            && self.transaction_date.is_none()
            && self.total_amount.is_none()
            && self.status.is_none()
    }
}

/// A successfully recorded transaction with its user-facing message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedTransaction {
    pub transaction: Transaction,
    pub message: String,
    pub is_capped: bool,
}

/// Persistence outcome carried in the pipeline state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    Saved(RecordedTransaction),
    Failed { error: String },
}

/// A chunk of knowledge-base text returned by retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: i64,
    /// Source document identifier (file name or logical name)
    pub source: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_transaction_status_round_trip() {
        for status in [
            TransactionStatus::Verified,
            TransactionStatus::NeedsReview,
            TransactionStatus::NotDeductible,
            TransactionStatus::Rejected,
        ] {
            assert_eq!(TransactionStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(TransactionStatus::from_str("approved").is_err());
    }

    #[test]
    fn test_classification_fallback() {
        let c = Classification::fallback("No relevant tax rules found in the knowledge base.");
        assert!(!c.is_deductible);
        assert_eq!(c.category, "None");
        assert_eq!(
            c.reasoning,
            "No relevant tax rules found in the knowledge base."
        );
    }

    #[test]
    fn test_receipt_merchant_default() {
        let receipt = ReceiptData::default();
        assert_eq!(receipt.merchant_or_default(), "Unknown Merchant");

        let receipt = ReceiptData {
            merchant_name: Some("Bangkok Hospital".into()),
            ..Default::default()
        };
        assert_eq!(receipt.merchant_or_default(), "Bangkok Hospital");
    }

    #[test]
    fn test_failed_receipt_carries_marker() {
        let receipt = ReceiptData::failed("could not reach model server");
        assert_eq!(
            receipt.error.as_deref(),
            Some("could not reach model server")
        );
        assert!(receipt.date.is_none());
        assert!(receipt.amount.is_none());
    }
}

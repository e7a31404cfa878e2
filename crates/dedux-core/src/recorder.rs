//! Transaction recording.
//!
//! Applies the status ladder when a classified receipt is written to the
//! ledger: deductible receipts with a known rule are saved with a
//! computed deduction, unknown categories are flagged for human review,
//! and non-deductible receipts keep a zero deduction. Human corrections
//! go through [`TransactionRecorder::update`], which recomputes the
//! deduction under the transaction's existing rule when the total
//! changes.

use tracing::{info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    Classification, NewTransaction, ReceiptData, RecordedTransaction, TransactionStatus,
    TransactionUpdate,
};
use crate::rules::compute_deduction;

/// Writes classified receipts and corrections to the transaction ledger.
#[derive(Clone)]
pub struct TransactionRecorder {
    db: Database,
    tax_year: i32,
}

impl TransactionRecorder {
    pub fn new(db: Database, tax_year: i32) -> Self {
        Self { db, tax_year }
    }

    /// Record a classified receipt for a user.
    ///
    /// `status` is the status given to a deductible transaction whose
    /// category has an active rule; the pipeline passes `Verified`, the
    /// manual API passes `NeedsReview`. The other ladder outcomes
    /// override it: an unknown category always lands in `NeedsReview`
    /// with a zero deduction, and a non-deductible classification always
    /// lands in `NotDeductible`.
    pub fn record(
        &self,
        user_id: &str,
        receipt: &ReceiptData,
        classification: &Classification,
        receipt_image: Option<String>,
        status: TransactionStatus,
    ) -> Result<RecordedTransaction> {
        let transaction_date = receipt
            .date
            .ok_or_else(|| Error::InvalidData("Missing transaction date in receipt data".into()))?;

        let total_amount = receipt.amount.unwrap_or(0.0);
        if !total_amount.is_finite() || total_amount <= 0.0 {
            return Err(Error::InvalidData(format!(
                "Invalid or missing amount in receipt data: {total_amount}"
            )));
        }

        let mut new_transaction = NewTransaction {
            user_id: user_id.to_string(),
            rule_id: None,
            receipt_image,
            merchant_name: receipt.merchant_or_default().to_string(),
            merchant_tax_id: receipt.tax_id.clone().unwrap_or_default(),
            transaction_date,
            total_amount,
            deductible_amount: 0.0,
            status,
            ai_reasoning: Some(classification.reasoning.clone()),
        };

        let rule = self.db.lookup_rule(&classification.category, self.tax_year)?;

        if !classification.is_deductible {
            // Keep the rule reference when the category exists, even
            // though nothing is deducted
            new_transaction.rule_id = rule.map(|r| r.id);
            new_transaction.status = TransactionStatus::NotDeductible;

            let transaction = self.db.insert_transaction(&new_transaction)?;
            info!(
                transaction_id = transaction.id,
                "Recorded non-deductible transaction"
            );
            return Ok(RecordedTransaction {
                message: format!("Transaction saved as not deductible. Amount: {total_amount:.2} THB"),
                is_capped: false,
                transaction,
            });
        }

        let rule = match rule {
            Some(rule) => rule,
            None => {
                warn!(
                    category = classification.category.as_str(),
                    "No active tax rule for category, flagging for review"
                );
                new_transaction.status = TransactionStatus::NeedsReview;

                let transaction = self.db.insert_transaction(&new_transaction)?;
                return Ok(RecordedTransaction {
                    message: format!(
                        "Transaction saved for review. Category '{}' not found in tax rules.",
                        classification.category
                    ),
                    is_capped: false,
                    transaction,
                });
            }
        };

        let deduction = compute_deduction(total_amount, Some(&rule));
        new_transaction.rule_id = Some(rule.id);
        new_transaction.deductible_amount = deduction.amount;

        let transaction = self.db.insert_transaction(&new_transaction)?;
        info!(
            transaction_id = transaction.id,
            category = rule.category_name.as_str(),
            deductible = deduction.amount,
            capped = deduction.is_capped,
            "Recorded transaction"
        );

        let message = if deduction.is_capped {
            format!(
                "Transaction saved. Amount: {total_amount:.2} THB, Deductible: {:.2} THB (capped at {:.2} THB limit)",
                deduction.amount, deduction.max_limit
            )
        } else {
            format!(
                "Transaction saved. Deductible amount: {:.2} THB",
                deduction.amount
            )
        };

        Ok(RecordedTransaction {
            transaction,
            message,
            is_capped: deduction.is_capped,
        })
    }

    /// Apply human corrections to a recorded transaction.
    ///
    /// When the total amount changes and the transaction carries a rule,
    /// the deduction is recomputed under that same rule. The category is
    /// never re-classified here; reassigning a rule is a separate
    /// concern.
    pub fn update(&self, id: i64, updates: &TransactionUpdate) -> Result<RecordedTransaction> {
        let mut recomputed: Option<f64> = None;

        if let Some(new_total) = updates.total_amount {
            if !new_total.is_finite() || new_total <= 0.0 {
                return Err(Error::InvalidData(format!(
                    "Invalid total amount: {new_total}"
                )));
            }

            let existing = self
                .db
                .get_transaction(id)?
                .ok_or_else(|| Error::NotFound(format!("Transaction {id} not found")))?;

            if let Some(rule_id) = existing.rule_id {
                if let Some(rule) = self.db.get_rule(rule_id)? {
                    recomputed = Some(compute_deduction(new_total, Some(&rule)).amount);
                }
            }
        }

        let transaction = self.db.update_transaction_fields(id, updates, recomputed)?;

        let mut message = String::from("Transaction updated successfully");
        let mut is_capped = false;
        if recomputed.is_some() && transaction.total_amount > transaction.deductible_amount {
            message.push_str(&format!(
                " (Deductible capped at {:.2} THB)",
                transaction.deductible_amount
            ));
            is_capped = true;
        }

        Ok(RecordedTransaction {
            transaction,
            message,
            is_capped,
        })
    }
}

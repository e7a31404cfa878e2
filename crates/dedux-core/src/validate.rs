//! Receipt validation
//!
//! Decides whether extracted receipt fields are complete enough to
//! classify, or whether the run must stop and ask the user for the
//! missing pieces.

use crate::models::ReceiptData;

/// Field names reported to the user, in reporting order.
pub const REQUIRED_FIELDS: &[&str] = &["date", "amount", "tax_id"];

/// Routing decision for a validated receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// Fields are complete; continue to classification
    Proceed,
    /// Stop and ask the user for the listed fields
    HumanInput { missing_fields: Vec<String> },
}

/// Validate extracted receipt fields.
///
/// An extraction-error marker or any missing required field routes to
/// human input. A blank tax ID counts as missing. The missing list is
/// ordered date, amount, tax_id and contains only fields actually
/// absent. Merchant name is never required.
pub fn validate_receipt(receipt: &ReceiptData) -> Routing {
    let mut missing = Vec::new();
    if receipt.date.is_none() {
        missing.push("date".to_string());
    }
    if receipt.amount.is_none() {
        missing.push("amount".to_string());
    }
    if receipt
        .tax_id
        .as_deref()
        .map_or(true, |t| t.trim().is_empty())
    {
        missing.push("tax_id".to_string());
    }

    if receipt.error.is_some() || !missing.is_empty() {
        Routing::HumanInput {
            missing_fields: missing,
        }
    } else {
        Routing::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn complete_receipt() -> ReceiptData {
        ReceiptData {
            date: NaiveDate::from_ymd_opt(2025, 1, 15),
            amount: Some(1_250.0),
            tax_id: Some("0105536112014".to_string()),
            merchant_name: Some("Bangkok Hospital".to_string()),
            error: None,
        }
    }

    #[test]
    fn test_complete_receipt_proceeds() {
        assert_eq!(validate_receipt(&complete_receipt()), Routing::Proceed);
    }

    #[test]
    fn test_missing_merchant_still_proceeds() {
        let mut receipt = complete_receipt();
        receipt.merchant_name = None;
        assert_eq!(validate_receipt(&receipt), Routing::Proceed);
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        let mut receipt = complete_receipt();
        receipt.tax_id = None;
        receipt.date = None;
        assert_eq!(
            validate_receipt(&receipt),
            Routing::HumanInput {
                missing_fields: vec!["date".to_string(), "tax_id".to_string()],
            }
        );
    }

    #[test]
    fn test_missing_amount_alone() {
        let mut receipt = complete_receipt();
        receipt.amount = None;
        assert_eq!(
            validate_receipt(&receipt),
            Routing::HumanInput {
                missing_fields: vec!["amount".to_string()],
            }
        );
    }

    #[test]
    fn test_blank_tax_id_counts_as_missing() {
        let mut receipt = complete_receipt();
        receipt.tax_id = Some("   ".to_string());
        assert_eq!(
            validate_receipt(&receipt),
            Routing::HumanInput {
                missing_fields: vec!["tax_id".to_string()],
            }
        );
    }

    #[test]
    fn test_all_fields_missing() {
        assert_eq!(
            validate_receipt(&ReceiptData::default()),
            Routing::HumanInput {
                missing_fields: vec![
                    "date".to_string(),
                    "amount".to_string(),
                    "tax_id".to_string()
                ],
            }
        );
    }

    #[test]
    fn test_error_marker_routes_to_human_input() {
        let mut receipt = complete_receipt();
        receipt.error = Some("vision model unavailable".to_string());
        // Marker wins even with complete fields
        assert_eq!(
            validate_receipt(&receipt),
            Routing::HumanInput {
                missing_fields: vec![],
            }
        );
    }
}

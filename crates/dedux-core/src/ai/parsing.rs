//! JSON parsing helpers for reasoner responses
//!
//! These functions extract JSON from model responses, which often include
//! markdown fences or extra text before/after the JSON payload.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{Classification, ReceiptData, CATEGORY_NONE};

/// Reasoning used when the model answered without a reasoning key.
pub const DEFAULT_REASONING: &str = "No reasoning provided.";

/// Date formats accepted from receipt extraction output.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

#[derive(Debug, Deserialize)]
struct RawReceipt {
    #[serde(default)]
    date: Option<serde_json::Value>,
    #[serde(default)]
    amount: Option<serde_json::Value>,
    #[serde(default)]
    tax_id: Option<serde_json::Value>,
    #[serde(default)]
    merchant_name: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    is_deductible: Option<bool>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse extracted receipt fields from a vision model response
///
/// Absent or null fields become None. Amounts are accepted as JSON numbers
/// or as strings with currency text and thousands separators. An `error`
/// key in the payload is carried through as the extraction-error marker.
pub fn parse_receipt_fields(response: &str) -> Result<ReceiptData> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    let raw: RawReceipt = match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                Error::InvalidData(format!("Invalid receipt JSON from model: {}", e))
            })?
        }
        _ => {
            return Err(Error::InvalidData(
                "No JSON found in receipt extraction response".into(),
            ))
        }
    };

    Ok(ReceiptData {
        date: raw.date.as_ref().and_then(value_to_date),
        amount: raw.amount.as_ref().and_then(value_to_amount),
        tax_id: raw.tax_id.as_ref().and_then(value_to_text),
        merchant_name: raw.merchant_name.as_ref().and_then(value_to_text),
        error: raw.error,
    })
}

/// Parse a deduction classification from a model response
///
/// Missing or null keys fall back to the defaults: not deductible,
/// category "None", reasoning "No reasoning provided.". A response with no
/// JSON object at all is an error; the classifier maps it to its
/// parse-failure fallback.
pub fn parse_classification(response: &str) -> Result<Classification> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    let raw: RawClassification = match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                // Truncate long responses for the error message, on char
                // boundaries since model output may carry Thai text
                let truncated = if json_str.chars().count() > 200 {
                    let cut: String = json_str.chars().take(200).collect();
                    format!("{}...", cut)
                } else {
                    json_str.to_string()
                };
                Error::InvalidData(format!(
                    "Invalid classification JSON from model: {} | Raw: {}",
                    e, truncated
                ))
            })?
        }
        _ => {
            return Err(Error::InvalidData(
                "No JSON found in classification response".into(),
            ))
        }
    };

    Ok(Classification {
        is_deductible: raw.is_deductible.unwrap_or(false),
        category: raw
            .category
            .unwrap_or_else(|| CATEGORY_NONE.to_string()),
        reasoning: raw
            .reasoning
            .unwrap_or_else(|| DEFAULT_REASONING.to_string()),
    })
}

fn value_to_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_amount(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|a| a.is_finite()),
        serde_json::Value::String(s) => parse_amount_text(s),
        _ => None,
    }
}

fn value_to_date(value: &serde_json::Value) -> Option<NaiveDate> {
    let text = value_to_text(value)?;
    parse_receipt_date(&text)
}

/// Parse an amount string like "1,234.50 THB" or "฿950"
pub fn parse_amount_text(text: &str) -> Option<f64> {
    // Strip currency symbols, spaces, and thousands separators
    let re = regex::Regex::new(r"[^0-9.\-]").ok()?;
    let cleaned = re.replace_all(text, "");
    let amount: f64 = cleaned.parse().ok()?;
    if amount.is_finite() {
        Some(amount)
    } else {
        None
    }
}

/// Parse a date string in the formats receipts commonly carry
// TODO: handle Buddhist-era years (2568 -> 2025) on extracted dates
pub fn parse_receipt_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_receipt_fields_complete() {
        let response = r#"{"date": "2025-01-15", "amount": 18000.50, "tax_id": "0105536112014", "merchant_name": "Bangkok Hospital"}"#;
        let receipt = parse_receipt_fields(response).unwrap();
        assert_eq!(receipt.date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(receipt.amount, Some(18000.50));
        assert_eq!(receipt.tax_id.as_deref(), Some("0105536112014"));
        assert_eq!(receipt.merchant_name.as_deref(), Some("Bangkok Hospital"));
        assert!(receipt.error.is_none());
    }

    #[test]
    fn test_parse_receipt_fields_with_fences_and_prose() {
        let response = "Here is the extraction:\n```json\n{\"date\": \"15/01/2025\", \"amount\": \"1,234.50 THB\", \"tax_id\": null}\n```";
        let receipt = parse_receipt_fields(response).unwrap();
        assert_eq!(receipt.date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(receipt.amount, Some(1234.50));
        assert!(receipt.tax_id.is_none());
        assert!(receipt.merchant_name.is_none());
    }

    #[test]
    fn test_parse_receipt_fields_null_and_missing() {
        let response = r#"{"date": null, "amount": null}"#;
        let receipt = parse_receipt_fields(response).unwrap();
        assert!(receipt.date.is_none());
        assert!(receipt.amount.is_none());
        assert!(receipt.tax_id.is_none());
    }

    #[test]
    fn test_parse_receipt_fields_error_marker() {
        let response = r#"{"error": "image too blurry to read"}"#;
        let receipt = parse_receipt_fields(response).unwrap();
        assert_eq!(receipt.error.as_deref(), Some("image too blurry to read"));
    }

    #[test]
    fn test_parse_receipt_fields_no_json() {
        let result = parse_receipt_fields("I could not read this receipt.");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_classification_complete() {
        let response = r#"{"is_deductible": true, "category": "Health Insurance", "reasoning": "Hospital insurance premium."}"#;
        let c = parse_classification(response).unwrap();
        assert!(c.is_deductible);
        assert_eq!(c.category, "Health Insurance");
        assert_eq!(c.reasoning, "Hospital insurance premium.");
    }

    #[test]
    fn test_parse_classification_defaults_for_missing_keys() {
        let c = parse_classification(r#"{"is_deductible": true}"#).unwrap();
        assert!(c.is_deductible);
        assert_eq!(c.category, "None");
        assert_eq!(c.reasoning, "No reasoning provided.");

        let c = parse_classification("{}").unwrap();
        assert!(!c.is_deductible);
        assert_eq!(c.category, "None");
    }

    #[test]
    fn test_parse_classification_tolerates_surrounding_text() {
        let response = "Sure! Here is my analysis:\n{\"is_deductible\": false, \"category\": \"None\", \"reasoning\": \"Groceries are not deductible.\"}\nLet me know if you need more.";
        let c = parse_classification(response).unwrap();
        assert!(!c.is_deductible);
        assert_eq!(c.reasoning, "Groceries are not deductible.");
    }

    #[test]
    fn test_parse_classification_no_json_is_error() {
        assert!(parse_classification("no json here").is_err());
    }

    #[test]
    fn test_parse_amount_text() {
        assert_eq!(parse_amount_text("1,234.50 THB"), Some(1234.50));
        assert_eq!(parse_amount_text("฿950"), Some(950.0));
        assert_eq!(parse_amount_text("  2500  "), Some(2500.0));
        assert_eq!(parse_amount_text("unreadable"), None);
    }

    #[test]
    fn test_parse_receipt_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 15);
        assert_eq!(parse_receipt_date("2025-01-15"), expected);
        assert_eq!(parse_receipt_date("15/01/2025"), expected);
        assert_eq!(parse_receipt_date("15-01-2025"), expected);
        assert_eq!(parse_receipt_date("January 15, 2025"), None);
    }
}

//! Transaction ledger handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{AppError, AppState, SuccessResponse};
use dedux_core::{
    Classification, ReceiptData, RecordedTransaction, Transaction, TransactionStatus,
    TransactionUpdate, DEFAULT_USER_ID,
};

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Filter by review status (verified, needs_review, not_deductible, rejected)
    pub status: Option<String>,
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

/// GET /api/transactions - List a user's transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<TransactionStatus>())
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;

    let transactions = state.db.list_transactions(&params.user_id, status)?;
    Ok(Json(transactions))
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, AppError> {
    let transaction = state
        .db
        .get_transaction(id)?
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;

    Ok(Json(transaction))
}

/// Body for manual transaction creation
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub merchant_name: Option<String>,
    pub merchant_tax_id: Option<String>,
    pub transaction_date: NaiveDate,
    pub total_amount: f64,
    /// Deduction category the entry claims
    pub category: String,
    pub reasoning: Option<String>,
    /// Review status; manual entries default to needs_review
    pub status: Option<TransactionStatus>,
}

/// POST /api/transactions - Create a transaction manually
///
/// Runs the same recording ladder as the pipeline, but the base status is
/// `needs_review` so manual entries get a human look before counting
/// toward deductions.
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTransactionRequest>,
) -> Result<Json<RecordedTransaction>, AppError> {
    let receipt = ReceiptData {
        date: Some(body.transaction_date),
        amount: Some(body.total_amount),
        tax_id: body.merchant_tax_id,
        merchant_name: body.merchant_name,
        error: None,
    };
    let classification = Classification {
        is_deductible: true,
        category: body.category,
        reasoning: body
            .reasoning
            .unwrap_or_else(|| "Manually entered transaction".to_string()),
    };
    let status = body.status.unwrap_or(TransactionStatus::NeedsReview);

    let saved = state
        .recorder
        .record(&body.user_id, &receipt, &classification, None, status)
        .map_err(AppError::from_core)?;

    Ok(Json(saved))
}

/// PATCH /api/transactions/:id - Apply human corrections
///
/// When the total amount changes and the transaction carries a rule, the
/// deductible amount is recomputed under that same rule.
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(updates): Json<TransactionUpdate>,
) -> Result<Json<RecordedTransaction>, AppError> {
    if updates.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }

    let saved = state
        .recorder
        .update(id, &updates)
        .map_err(AppError::from_core)?;

    Ok(Json(saved))
}

/// DELETE /api/transactions/:id - Delete a transaction
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.db.delete_transaction(id)? {
        return Err(AppError::not_found("Transaction not found"));
    }

    Ok(Json(SuccessResponse { success: true }))
}

//! Deduction rule handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState};
use dedux_core::DeductionRule;

/// Query parameters for listing rules
#[derive(Debug, Deserialize)]
pub struct RuleQuery {
    /// Restrict to one tax year; omitted lists every year
    pub tax_year: Option<i32>,
}

/// GET /api/rules - List deduction rules
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RuleQuery>,
) -> Result<Json<Vec<DeductionRule>>, AppError> {
    let rules = state.db.list_rules(params.tax_year)?;
    Ok(Json(rules))
}

/// GET /api/rules/:id - Get a single deduction rule
pub async fn get_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DeductionRule>, AppError> {
    let rule = state
        .db
        .get_rule(id)?
        .ok_or_else(|| AppError::not_found("Rule not found"))?;

    Ok(Json(rule))
}

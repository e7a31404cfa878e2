//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use dedux_core::Reasoner;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// A pooled connection could be checked out
    pub database: bool,
    /// The model backend answered its health probe
    pub reasoner: bool,
}

/// GET /health - Liveness and backend reachability
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = state.db.conn().is_ok();
    let reasoner = state.reasoner.health_check().await;

    Json(HealthResponse {
        status: "ok",
        database,
        reasoner,
    })
}

//! /api/status, /api/transaction handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use trickle_services::TransferSnapshot;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

pub async fn handle_status(State(state): State<ApiState>) -> Json<TransferSnapshot> {
    Json(state.transfer.snapshot().await)
}

// ── /transaction (DELETE) ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct AbortResponse {
    pub aborted: Option<String>,
}

pub async fn handle_abort(State(state): State<ApiState>) -> Json<AbortResponse> {
    Json(AbortResponse {
        aborted: state.transfer.abort().await,
    })
}

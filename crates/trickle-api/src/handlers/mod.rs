//! HTTP handlers — the fetch/acknowledge surface and operator endpoints.

pub mod status;
pub mod transfer;

use axum::http::StatusCode;

use trickle_services::{TransferError, TransferService};

#[derive(Clone)]
pub struct ApiState {
    pub transfer: TransferService,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Map a transfer outcome onto a status code and a short text body.
fn reject(err: TransferError) -> (StatusCode, String) {
    let status = match &err {
        TransferError::MissingId | TransferError::InvalidId => StatusCode::BAD_REQUEST,
        TransferError::Conflict { .. } | TransferError::NotActive { .. } => StatusCode::FORBIDDEN,
        TransferError::EndOfData => StatusCode::NOT_FOUND,
        TransferError::Source(e) if e.is_upstream() => StatusCode::BAD_GATEWAY,
        TransferError::Source(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "chunk source failed");
    }
    (status, err.to_string())
}

// Re-export handler functions for use in router setup.
pub use status::{handle_abort, handle_status};
pub use transfer::{handle_acknowledge, handle_fetch, handle_missing_id};

//! `GET /{id}` fetches a chunk, `PUT /{id}` acknowledges it.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use super::{reject, ApiState};

pub async fn handle_fetch(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let chunk = state.transfer.fetch(&id).await.map_err(reject)?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        chunk,
    )
        .into_response())
}

/// Any request body (devices send a token payload) is ignored.
pub async fn handle_acknowledge(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.transfer.acknowledge(&id).await.map_err(reject)?;
    Ok(StatusCode::OK)
}

pub async fn handle_missing_id() -> (StatusCode, String) {
    reject(trickle_services::TransferError::MissingId)
}

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;

use ledger::settlement;

use super::{created_status, envelope};
use crate::error::ApiError;
use crate::state::SharedState;

/// `GET /operations/{operation}`
pub async fn retrieve_operation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let op = settlement::retrieve_operation(&state.mint, &id)?;
    Ok(Json(envelope("operation", &op)?))
}

/// `POST /operations/{operation}`
///
/// Propagation notice from a peer: the operation is pulled from its
/// owner's mint and stored as a replica.
pub async fn receive_operation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let received = settlement::receive_operation(&state.mint, &id).await?;
    Ok((
        created_status(received.created),
        Json(envelope("operation", &received.record)?),
    ))
}

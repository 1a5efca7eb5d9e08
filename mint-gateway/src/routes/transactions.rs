use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;

use ledger::{MintError, settlement};

use super::{Caller, Fields, created_status, envelope};
use crate::error::ApiError;
use crate::state::SharedState;

/// `POST /transactions` (form: `pair`, `amount`, `destination`, `path[]`)
///
/// Reserves a transaction owned by the caller. Answers once every mint on
/// the path has reserved its hops.
pub async fn create_transaction(
    State(state): State<SharedState>,
    Caller(owner): Caller,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let fields = Fields(fields);
    let req = settlement::TransactionRequest {
        owner,
        pair: fields.require("pair")?,
        amount: fields.require("amount")?,
        destination: fields.require("destination")?,
        path: fields.all("path"),
    };
    let view = settlement::create_transaction(&state.mint, req).await?;
    Ok((StatusCode::CREATED, Json(envelope("transaction", &view)?)))
}

/// `GET /transactions/{transaction}`
pub async fn retrieve_transaction(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let view = settlement::retrieve_transaction(&state.mint, &id)?;
    Ok(Json(envelope("transaction", &view)?))
}

/// `POST /transactions/{transaction}` (form: `hop`)
///
/// Hop reservation forwarded by the mint holding the previous hop.
pub async fn reserve_hop(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let fields = Fields(fields);
    let raw = fields.require("hop")?;
    let hop: u32 = raw
        .parse()
        .map_err(|_| MintError::invalid("hop_invalid", format!("invalid hop `{raw}`")))?;
    let reservation = settlement::reserve_hop(&state.mint, &id, hop).await?;
    Ok((
        created_status(reservation.created),
        Json(envelope("transaction", &reservation.view)?),
    ))
}

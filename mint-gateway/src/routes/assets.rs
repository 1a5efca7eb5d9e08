use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;

use ledger::settlement;

use super::{Caller, Fields, envelope};
use crate::error::ApiError;
use crate::state::SharedState;

/// `POST /assets` (form: `code`, `scale`)
///
/// Issues the asset `caller[CODE.SCALE]`.
pub async fn create_asset(
    State(state): State<SharedState>,
    Caller(owner): Caller,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let fields = Fields(fields);
    let code = fields.require("code")?;
    let scale = fields.require("scale")?;
    let asset = settlement::create_asset(&state.mint, &owner, &code, &scale)?;
    Ok((StatusCode::CREATED, Json(envelope("asset", &asset)?)))
}

/// `GET /assets/{asset}`
pub async fn retrieve_asset(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let asset = settlement::retrieve_asset(&state.mint, &name)?;
    Ok(Json(envelope("asset", &asset)?))
}

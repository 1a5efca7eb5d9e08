use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;

use ledger::{Offer, settlement};

use super::{Caller, Fields, created_status, envelope};
use crate::error::ApiError;
use crate::state::SharedState;

/// Offer document: the stored record plus its `pair` and `price` in
/// `base/quote` form.
fn offer_envelope(offer: &Offer) -> Result<Value, ApiError> {
    let mut body = envelope("offer", offer)?;
    if let Some(record) = body.get_mut("offer").and_then(Value::as_object_mut) {
        record.insert(
            "pair".to_string(),
            Value::String(format!("{}/{}", offer.base_asset, offer.quote_asset)),
        );
        record.insert("price".to_string(), Value::String(offer.price().to_string()));
    }
    Ok(body)
}

/// `POST /offers` (form: `pair`, `price`, `amount`)
pub async fn create_offer(
    State(state): State<SharedState>,
    Caller(owner): Caller,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let fields = Fields(fields);
    let req = settlement::OfferRequest {
        owner,
        pair: fields.require("pair")?,
        price: fields.require("price")?,
        amount: fields.require("amount")?,
    };
    let offer = settlement::create_offer(&state.mint, req)?;
    Ok((StatusCode::CREATED, Json(offer_envelope(&offer)?)))
}

/// `GET /offers/{offer}`
pub async fn retrieve_offer(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let offer = settlement::retrieve_offer(&state.mint, &id)?;
    Ok(Json(offer_envelope(&offer)?))
}

/// `POST /offers/{offer}/close`
pub async fn close_offer(
    State(state): State<SharedState>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let offer = settlement::close_offer(&state.mint, &owner, &id)?;
    Ok(Json(offer_envelope(&offer)?))
}

/// `POST /offers/{offer}`
///
/// Propagation notice from a peer: the offer is pulled from its owner's
/// mint and stored as a replica.
pub async fn receive_offer(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let received = settlement::receive_offer(&state.mint, &id).await?;
    Ok((
        created_status(received.created),
        Json(offer_envelope(&received.record)?),
    ))
}

//! HTTP gateway of a mint.
//!
//! Exposes the settlement operations of the `ledger` crate:
//!
//! - `GET  /health`
//! - `POST /assets`, `GET /assets/{asset}`
//! - `POST /offers`, `GET /offers/{offer}`, `POST /offers/{offer}/close`
//! - `POST /transactions`, `GET /transactions/{transaction}`
//!
//! and the peer-to-peer endpoints other mints call:
//!
//! - `POST /transactions/{transaction}` (hop reservation),
//! - `POST /offers/{offer}`, `POST /operations/{operation}` (propagation
//!   notices), `GET /operations/{operation}`.
//!
//! Callers of the public endpoints are identified by the `X-Mint-User`
//! header set by the authentication layer in front of the gateway.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use routes::{assets, health, offers, operations, transactions};
use state::SharedState;

/// Builds the router serving `state`.
pub fn app(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/assets", post(assets::create_asset))
        .route("/assets/{asset}", get(assets::retrieve_asset))
        .route("/offers", post(offers::create_offer))
        .route(
            "/offers/{offer}",
            get(offers::retrieve_offer).post(offers::receive_offer),
        )
        .route("/offers/{offer}/close", post(offers::close_offer))
        .route("/transactions", post(transactions::create_transaction))
        .route(
            "/transactions/{transaction}",
            get(transactions::retrieve_transaction).post(transactions::reserve_hop),
        )
        .route(
            "/operations/{operation}",
            get(operations::retrieve_operation).post(operations::receive_operation),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Shared application state.

use std::sync::Arc;

use ledger::MintContext;

/// State held by the request handlers.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// The mint served by this gateway.
    pub mint: MintContext,
}

impl AppState {
    pub fn new(mint: MintContext) -> SharedState {
        Arc::new(Self { mint })
    }
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;

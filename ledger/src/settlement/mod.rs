//! Settlement operations of a mint.
//!
//! These are the entry points the HTTP gateway (and the loopback client)
//! call. Each takes the [`MintContext`] of the mint it runs on:
//!
//! - [`assets`]: asset creation and lookup,
//! - [`offers`]: offer creation, closing and lookup,
//! - [`transactions`]: the reservation protocol, both for transactions
//!   created here and for hops forwarded by other mints,
//! - [`propagation`]: receivers that pull canonical records pushed by
//!   other mints, and operation lookup.
//!
//! Callers are identified by address. Authenticating them is the job of
//! the layer in front of the gateway.

use crate::context::MintContext;
use crate::error::MintError;
use crate::types::{Address, Amount};

pub mod assets;
pub mod offers;
pub mod propagation;
pub mod transactions;

pub use self::assets::{create_asset, retrieve_asset};
pub use self::offers::{OfferRequest, close_offer, create_offer, retrieve_offer};
pub use self::propagation::{Received, receive_offer, receive_operation, retrieve_operation};
pub use self::transactions::{
    HopReservation, TransactionRequest, create_transaction, reserve_hop, retrieve_transaction,
};

/// Parses `owner` and checks that this mint is authoritative for it.
pub(crate) fn local_address(ctx: &MintContext, owner: &str) -> Result<Address, MintError> {
    let address = Address::parse(owner)?;
    if !ctx.is_local(&address.host) {
        return Err(MintError::invalid(
            "address_invalid",
            format!("{owner} is not hosted on {}", ctx.host),
        ));
    }
    Ok(address)
}

pub(crate) fn positive_amount(raw: &str) -> Result<Amount, MintError> {
    let amount = Amount::parse(raw)?;
    if amount.is_zero() {
        return Err(MintError::invalid("amount_invalid", "amount must be positive"));
    }
    Ok(amount)
}

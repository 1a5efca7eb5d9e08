//! Offer lifecycle on the owner's mint.
//!
//! An offer is created `active` with `remainder = amount`. Crossings only
//! ever decrease the remainder; reaching zero makes the offer `consumed`,
//! and its owner may `close` it at any time before that. Neither state can
//! be left. Every change is propagated to the mints issuing the offer's
//! assets.

use tracing::{debug, info};

use super::{local_address, positive_amount};
use crate::context::MintContext;
use crate::error::MintError;
use crate::storage::LedgerRead;
use crate::tasks::TaskKind;
use crate::types::{Offer, OfferStatus, Pair, Price, Propagation, new_id};

/// Input of [`create_offer`], as received from the caller.
#[derive(Clone, Debug)]
pub struct OfferRequest {
    pub owner: String,
    /// `base/quote`: the owner gives `base` and receives `quote`.
    pub pair: String,
    /// `base_price/quote_price`.
    pub price: String,
    /// Quote amount the owner is willing to receive.
    pub amount: String,
}

pub fn create_offer(ctx: &MintContext, req: OfferRequest) -> Result<Offer, MintError> {
    let owner = local_address(ctx, &req.owner)?.normalized();
    let pair = Pair::parse(&req.pair)?;
    let price = Price::parse(&req.price)?;
    let amount = positive_amount(&req.amount)?;

    if pair.base.issuer != owner {
        return Err(MintError::invalid(
            "pair_invalid",
            format!("base asset {} is not issued by {owner}", pair.base),
        ));
    }
    let base_asset = pair.base.to_string();
    if ctx.store.asset(&base_asset)?.is_none() {
        return Err(MintError::not_found(
            "asset_not_found",
            format!("asset {base_asset} not found"),
        ));
    }

    let now = ctx.now_ms();
    let offer = Offer {
        id: new_id(&owner, "offer"),
        created: now,
        owner,
        base_asset,
        quote_asset: pair.quote.to_string(),
        base_price: price.base,
        quote_price: price.quote,
        remainder: amount.clone(),
        amount,
        status: OfferStatus::Active,
        propagation: Propagation::Canonical,
    };

    ctx.store.atomically(|txn| -> Result<(), MintError> {
        txn.put_offer(&offer)?;
        txn.enqueue(TaskKind::PropagateOffer, &offer.id, now)?;
        Ok(())
    })?;

    info!(offer = %offer.id, pair = %pair, price = %offer.price(), amount = %offer.amount, "offer created");
    Ok(offer)
}

/// Closes an active offer. Closing a closed offer changes nothing.
pub fn close_offer(ctx: &MintContext, owner: &str, id: &str) -> Result<Offer, MintError> {
    let owner = local_address(ctx, owner)?.normalized();
    let not_found = || MintError::not_found("offer_not_found", format!("offer {id} not found"));

    let offer = ctx.store.atomically(|txn| -> Result<Offer, MintError> {
        let mut offer = txn
            .offer(id)?
            .filter(|o| o.propagation == Propagation::Canonical && o.owner == owner)
            .ok_or_else(not_found)?;
        match offer.status {
            OfferStatus::Closed => {
                debug!(offer = %id, "offer already closed");
                Ok(offer)
            }
            OfferStatus::Consumed => Err(MintError::invalid(
                "offer_not_active",
                format!("offer {id} is consumed"),
            )),
            OfferStatus::Active => {
                offer.status = OfferStatus::Closed;
                txn.put_offer(&offer)?;
                txn.enqueue(TaskKind::PropagateOffer, &offer.id, ctx.now_ms())?;
                info!(offer = %id, remainder = %offer.remainder, "offer closed");
                Ok(offer)
            }
        }
    })?;
    Ok(offer)
}

/// Returns the offer stored on this mint, canonical or replica.
pub fn retrieve_offer(ctx: &MintContext, id: &str) -> Result<Offer, MintError> {
    ctx.store
        .offer(id)?
        .ok_or_else(|| MintError::not_found("offer_not_found", format!("offer {id} not found")))
}

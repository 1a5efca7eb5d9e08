//! Propagation receivers.
//!
//! A mint that changes a canonical record notifies the other mints the
//! record involves. The notice only names the record; the receiver pulls it
//! from the owner's mint and stores it as a replica. Notices can arrive
//! late, twice, or out of order, so offer replicas are merged monotonically:
//! a replica never regains remainder it already lost, and never becomes
//! active again once it left that state.

use tracing::{debug, info};

use crate::context::MintContext;
use crate::error::MintError;
use crate::storage::LedgerRead;
use crate::types::{AssetName, Offer, Operation, Propagation, ResourceId, Transaction, host_of};

/// A replica written (or confirmed) by a receiver.
#[derive(Clone, Debug)]
pub struct Received<T> {
    pub record: T,
    /// `false` when a replica was already stored.
    pub created: bool,
}

fn propagation_invalid(message: String) -> MintError {
    MintError::invalid("propagation_invalid", message)
}

/// Rejects notices about records this mint owns.
fn remote_owner(ctx: &MintContext, id: &str) -> Result<(), MintError> {
    let host = ResourceId::parse(id)?.host()?;
    if ctx.is_local(&host) {
        return Err(propagation_invalid(format!("{id} is owned by this mint")));
    }
    Ok(())
}

fn pulled_id(id: &str, found: &str) -> Result<(), MintError> {
    if id != found {
        return Err(propagation_invalid(format!("owner answered {found} for {id}")));
    }
    Ok(())
}

/// Whether `incoming` may replace the stored replica `existing`.
fn supersedes(existing: &Offer, incoming: &Offer) -> bool {
    if incoming.remainder > existing.remainder {
        return false;
    }
    existing.is_active() || !incoming.is_active()
}

/// Pulls offer `id` from its owner's mint and stores it as a replica.
pub async fn receive_offer(ctx: &MintContext, id: &str) -> Result<Received<Offer>, MintError> {
    remote_owner(ctx, id)?;
    let mut offer = match ctx.client.fetch_offer(id).await {
        Ok(offer) => offer,
        Err(e) if e.is_not_found() => {
            return Err(MintError::not_found("offer_not_found", format!("offer {id} not found")));
        }
        Err(e) => return Err(e.into()),
    };
    pulled_id(id, &offer.id)?;

    let base = AssetName::parse(&offer.base_asset)?.issuer_host()?;
    let quote = AssetName::parse(&offer.quote_asset)?.issuer_host()?;
    if !ctx.is_local(&base) && !ctx.is_local(&quote) {
        return Err(propagation_invalid(format!(
            "offer {id} involves no asset issued on {}",
            ctx.host
        )));
    }
    offer.propagation = Propagation::Propagated;

    ctx.store.atomically(|txn| -> Result<_, MintError> {
        match txn.offer(id)? {
            Some(existing) if !supersedes(&existing, &offer) => {
                debug!(offer = %id, remainder = %existing.remainder, "stale offer replica ignored");
                Ok(Received {
                    record: existing,
                    created: false,
                })
            }
            existing => {
                txn.put_offer(&offer)?;
                info!(offer = %id, status = ?offer.status, remainder = %offer.remainder, "offer replica stored");
                Ok(Received {
                    record: offer.clone(),
                    created: existing.is_none(),
                })
            }
        }
    })
}

/// Pulls transaction `id` from its owner's mint as a replica.
async fn pull_transaction(ctx: &MintContext, id: &str) -> Result<Transaction, MintError> {
    let view = match ctx.client.fetch_transaction(id).await {
        Ok(view) => view,
        Err(e) if e.is_not_found() => {
            return Err(propagation_invalid(format!("transaction {id} unknown to its owner")));
        }
        Err(e) => return Err(e.into()),
    };
    pulled_id(id, &view.transaction.id)?;
    Ok(Transaction {
        propagation: Propagation::Propagated,
        ..view.transaction
    })
}

/// Pulls operation `id` from its owner's mint and stores it as a replica.
///
/// A mint that took no part in the reservation, such as one only holding
/// the destination user, has no copy of the transaction yet; it is pulled
/// along with the operation.
pub async fn receive_operation(ctx: &MintContext, id: &str) -> Result<Received<Operation>, MintError> {
    remote_owner(ctx, id)?;
    let mut op = match ctx.client.fetch_operation(id).await {
        Ok(op) => op,
        Err(e) if e.is_not_found() => {
            return Err(MintError::not_found(
                "operation_not_found",
                format!("operation {id} not found"),
            ));
        }
        Err(e) => return Err(e.into()),
    };
    pulled_id(id, &op.id)?;

    if !ctx.is_local(&host_of(&op.source)?) && !ctx.is_local(&host_of(&op.destination)?) {
        return Err(propagation_invalid(format!(
            "operation {id} has no participant on {}",
            ctx.host
        )));
    }
    op.propagation = Propagation::Propagated;

    let transaction = match ctx.store.transaction(&op.transaction)? {
        Some(_) => None,
        None => Some(pull_transaction(ctx, &op.transaction).await?),
    };

    let created = ctx.store.atomically(|txn| -> Result<_, MintError> {
        if let Some(transaction) = &transaction {
            if txn.transaction(&transaction.id)?.is_none() {
                txn.put_transaction(transaction)?;
            }
        }
        let created = txn.operation(id)?.is_none();
        txn.put_operation(&op)?;
        Ok(created)
    })?;
    info!(operation = %id, hop = op.transaction_hop, created, "operation replica stored");
    Ok(Received { record: op, created })
}

/// Returns the operation stored on this mint, canonical or replica.
pub fn retrieve_operation(ctx: &MintContext, id: &str) -> Result<Operation, MintError> {
    ctx.store.operation(id)?.ok_or_else(|| {
        MintError::not_found("operation_not_found", format!("operation {id} not found"))
    })
}

//! Transaction reservation.
//!
//! A transaction moves value from its owner to a destination through a
//! path of offers `o_1..o_n` owned by users `u_1..u_n`. It is laid out as
//! alternating hops:
//!
//! ```text
//! hop:     0        1        2        3        4   ...   2n
//!        op u0->u1  cross o1  op u1->u2  cross o2  op ...   op un->dest
//! mint:    M(u0)    M(u1)    M(u1)    M(u2)    M(u2)       M(un)
//! ```
//!
//! The owner's mint validates the request, computes the chain, and in one
//! unit of work stores the canonical transaction, hop 0 and every
//! following leg whose offer it hosts. It then asks the mint hosting the
//! next offer to reserve from that offer's crossing hop. That mint pulls
//! the canonical transaction and the offers itself, recomputes the chain,
//! stores its own legs and forwards in turn, until the destination leg is
//! written.
//!
//! A hop request for an offer that this transaction already crossed is
//! answered with the local copy and has no other effect, so a replayed or
//! reposted request can never decrement a remainder twice.

use std::time::Instant;

use tracing::{debug, info, warn};

use super::{local_address, positive_amount};
use crate::client::ClientError;
use crate::context::MintContext;
use crate::crossing::{Chain, CrossingError, PathError, check_path, compute_chain, crossing_hop, offer_index_for_hop, operation_hop};
use crate::error::MintError;
use crate::storage::{LedgerRead, StoreTxn};
use crate::tasks::TaskKind;
use crate::types::{
    Address, Amount, Crossing, Offer, OfferStatus, Operation, Pair, Propagation, ResourceId, Transaction,
    TransactionStatus, TransactionView, host_of, new_id, new_token,
};

/// Input of [`create_transaction`], as received from the caller.
#[derive(Clone, Debug)]
pub struct TransactionRequest {
    pub owner: String,
    /// `base/quote`: the owner sends `base`, the destination receives
    /// `quote`.
    pub pair: String,
    /// Quote amount the destination receives.
    pub amount: String,
    pub destination: String,
    /// Offer ids, source to destination.
    pub path: Vec<String>,
}

/// Result of [`reserve_hop`].
#[derive(Clone, Debug)]
pub struct HopReservation {
    pub view: TransactionView,
    /// `false` when the hop had already been reserved.
    pub created: bool,
}

fn path_invalid(e: PathError) -> MintError {
    MintError::invalid("path_invalid", e.to_string())
}

fn offer_missing(id: &str) -> MintError {
    MintError::TransactionFailed(format!("offer {id} not found"))
}

/// Loads path offers: canonical rows for offers hosted here, the owner
/// mint's copy otherwise.
async fn load_offers(ctx: &MintContext, ids: &[String]) -> Result<Vec<Offer>, MintError> {
    let mut offers = Vec::with_capacity(ids.len());
    for id in ids {
        let host = ResourceId::parse(id)
            .and_then(|rid| rid.host())
            .map_err(|e| MintError::invalid("path_invalid", e.to_string()))?;
        let offer = if ctx.is_local(&host) {
            ctx.store
                .offer(id)?
                .filter(|o| o.propagation == Propagation::Canonical)
                .ok_or_else(|| offer_missing(id))?
        } else {
            match ctx.client.fetch_offer(id).await {
                Ok(offer) => offer,
                Err(e) if e.is_not_found() => return Err(offer_missing(id)),
                Err(e) => return Err(e.into()),
            }
        };
        if offer.id != *id {
            return Err(MintError::TransactionFailed(format!(
                "mint {host} answered offer {} for {id}",
                offer.id
            )));
        }
        offers.push(offer);
    }
    Ok(offers)
}

/// One leg of value movement.
struct Leg {
    source: String,
    destination: String,
    asset: String,
    amount: Amount,
}

/// The part of a transaction a mint reserves, starting at path position
/// `start`.
struct Walk<'a> {
    tx: &'a Transaction,
    pair: &'a Pair,
    /// `path[start..]`.
    offers: &'a [Offer],
    start: usize,
    /// Computed over `offers`.
    chain: &'a Chain,
}

impl Walk<'_> {
    fn len(&self) -> usize {
        self.tx.path.len()
    }

    fn offer(&self, k: usize) -> &Offer {
        &self.offers[k - self.start]
    }

    fn crossing_amount(&self, k: usize) -> &Amount {
        &self.chain.links[k - self.start].amount
    }

    /// Leg `j` moves value from participant `j` to participant `j + 1`.
    fn leg(&self, j: usize) -> Leg {
        let source = if j == 0 {
            self.tx.owner.clone()
        } else {
            self.offer(j - 1).owner.clone()
        };
        let destination = if j < self.len() {
            self.offer(j).owner.clone()
        } else {
            self.tx.destination.clone()
        };
        let asset = if j == 0 {
            self.pair.base.to_string()
        } else {
            self.offer(j - 1).base_asset.clone()
        };
        Leg {
            source,
            destination,
            asset,
            amount: self.chain.leg_amount(j - self.start).clone(),
        }
    }
}

fn write_operation(txn: &mut StoreTxn<'_>, ctx: &MintContext, walk: &Walk<'_>, j: usize, now: u64) -> Result<(), MintError> {
    let leg = walk.leg(j);
    let op = Operation {
        id: new_id(&leg.source, "operation"),
        created: now,
        owner: leg.source.clone(),
        asset: leg.asset,
        source: leg.source,
        destination: leg.destination,
        amount: leg.amount,
        status: TransactionStatus::Reserved,
        transaction: walk.tx.id.clone(),
        transaction_hop: operation_hop(j),
        propagation: Propagation::Canonical,
    };
    txn.put_operation(&op)?;

    let crosses_mints = !ctx.is_local(&host_of(&op.source)?) || !ctx.is_local(&host_of(&op.destination)?);
    if crosses_mints {
        txn.enqueue(TaskKind::PropagateOperation, &op.id, now)?;
    }
    debug!(operation = %op.id, hop = op.transaction_hop, amount = %op.amount, "operation reserved");
    Ok(())
}

fn cross_offer(txn: &mut StoreTxn<'_>, ctx: &MintContext, walk: &Walk<'_>, k: usize, now: u64) -> Result<(), MintError> {
    let id = &walk.offer(k).id;
    let amount = walk.crossing_amount(k);
    let mut offer = txn
        .offer(id)?
        .filter(|o| o.propagation == Propagation::Canonical)
        .ok_or_else(|| offer_missing(id))?;

    if !offer.is_active() {
        return Err(CrossingError::OfferInactive {
            index: k,
            offer: id.clone(),
        }
        .into());
    }
    let remainder = offer
        .remainder
        .checked_sub(amount)
        .ok_or_else(|| CrossingError::InsufficientRemainder {
            index: k,
            offer: id.clone(),
            needed: amount.clone(),
            remainder: offer.remainder.clone(),
        })?;
    offer.remainder = remainder;
    if offer.remainder.is_zero() {
        offer.status = OfferStatus::Consumed;
    }
    txn.put_offer(&offer)?;

    let crossing = Crossing {
        id: new_id(&offer.owner, "crossing"),
        created: now,
        owner: offer.owner.clone(),
        offer: offer.id.clone(),
        amount: amount.clone(),
        status: TransactionStatus::Reserved,
        transaction: walk.tx.id.clone(),
        transaction_hop: crossing_hop(k),
    };
    txn.insert_crossing(&crossing)?;
    txn.enqueue(TaskKind::PropagateOffer, &offer.id, now)?;
    debug!(offer = %offer.id, hop = crossing.transaction_hop, amount = %amount, remainder = %offer.remainder, "offer crossed");
    Ok(())
}

/// Writes this mint's consecutive legs, starting with the crossing of
/// offer `walk.start` (preceded by hop 0 when `first_leg` is set).
///
/// Returns the next mint and hop to forward to, if the walk continues
/// elsewhere.
fn write_legs(
    txn: &mut StoreTxn<'_>,
    ctx: &MintContext,
    walk: &Walk<'_>,
    first_leg: bool,
) -> Result<Option<(String, u32)>, MintError> {
    let now = ctx.now_ms();
    if first_leg {
        write_operation(txn, ctx, walk, 0, now)?;
    }
    for k in walk.start..walk.len() {
        let host = host_of(&walk.offer(k).owner)?;
        if !ctx.is_local(&host) {
            return Ok(Some((host, crossing_hop(k))));
        }
        cross_offer(txn, ctx, walk, k, now)?;
        write_operation(txn, ctx, walk, k + 1, now)?;
    }
    Ok(None)
}

async fn forward(ctx: &MintContext, id: &str, host: &str, hop: u32) -> Result<(), MintError> {
    info!(transaction = %id, %host, hop, "forwarding reservation");
    match ctx.client.reserve_hop(host, id, hop).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_rejection() => {
            warn!(transaction = %id, %host, hop, error = %e, "downstream mint refused reservation");
            Err(MintError::TransactionFailed(format!("mint {host} refused hop {hop}: {e}")))
        }
        Err(e) => {
            warn!(transaction = %id, %host, hop, error = %e, "downstream mint unreachable");
            Err(e.into())
        }
    }
}

fn observe_result<T>(ctx: &MintContext, result: &Result<T, MintError>, started: Instant, reserved: bool) {
    ctx.observe(|m| match result {
        Ok(_) => {
            if reserved {
                m.settlement.transactions_reserved.inc();
            }
            m.settlement
                .reservation_seconds
                .observe(started.elapsed().as_secs_f64());
        }
        Err(e) => m
            .settlement
            .transactions_rejected
            .with_label_values(&[e.code()])
            .inc(),
    });
}

/// Creates and reserves a transaction owned by a local user.
pub async fn create_transaction(ctx: &MintContext, req: TransactionRequest) -> Result<TransactionView, MintError> {
    let started = Instant::now();
    let result = reserve_new(ctx, req).await;
    observe_result(ctx, &result, started, true);
    if let Err(e) = &result {
        debug!(error = %e, code = e.code(), "transaction not reserved");
    }
    result
}

async fn reserve_new(ctx: &MintContext, req: TransactionRequest) -> Result<TransactionView, MintError> {
    let owner = local_address(ctx, &req.owner)?.normalized();
    let pair = Pair::parse(&req.pair)?;
    let amount = positive_amount(&req.amount)?;
    let destination = Address::parse(&req.destination)?;
    if req.path.len() > ctx.settlement.max_path_length {
        return Err(MintError::invalid(
            "path_invalid",
            format!(
                "path has {} offers, at most {} allowed",
                req.path.len(),
                ctx.settlement.max_path_length
            ),
        ));
    }

    let offers = load_offers(ctx, &req.path).await?;
    check_path(&pair, &offers, 0).map_err(path_invalid)?;
    let chain = compute_chain(&offers, &amount)?;

    let tx = Transaction {
        id: new_id(&owner, "transaction"),
        created: ctx.now_ms(),
        owner,
        pair: pair.to_string(),
        amount,
        destination: destination.to_string(),
        path: req.path,
        status: TransactionStatus::Reserved,
        lock: new_token("lock"),
        propagation: Propagation::Canonical,
    };
    let walk = Walk {
        tx: &tx,
        pair: &pair,
        offers: &offers,
        start: 0,
        chain: &chain,
    };

    let next = ctx.store.atomically(|txn| -> Result<_, MintError> {
        txn.put_transaction(&tx)?;
        write_legs(txn, ctx, &walk, true)
    })?;
    info!(
        transaction = %tx.id,
        amount = %tx.amount,
        source_amount = %chain.source_amount(),
        hops = 2 * tx.path.len() + 1,
        "transaction reserved"
    );

    if let Some((host, hop)) = next {
        forward(ctx, &tx.id, &host, hop).await?;
    }
    retrieve_transaction(ctx, &tx.id)
}

/// Reserves transaction `id` on this mint from crossing hop `hop`, as
/// requested by the mint holding the previous hop.
///
/// Nothing in the request is trusted beyond the id and hop: the
/// transaction is pulled from its owner's mint and the offers from theirs.
pub async fn reserve_hop(ctx: &MintContext, id: &str, hop: u32) -> Result<HopReservation, MintError> {
    let started = Instant::now();
    let result = reserve_forwarded(ctx, id, hop).await;
    let created = matches!(&result, Ok(r) if r.created);
    observe_result(ctx, &result, started, created);
    result
}

async fn fetch_canonical(ctx: &MintContext, id: &str) -> Result<Transaction, MintError> {
    let not_found = || MintError::not_found("transaction_not_found", format!("transaction {id} not found"));
    let host = ResourceId::parse(id)?.host()?;
    let tx = if ctx.is_local(&host) {
        ctx.store
            .transaction(id)?
            .filter(|t| t.propagation == Propagation::Canonical)
            .ok_or_else(not_found)?
    } else {
        match ctx.client.fetch_transaction(id).await {
            Ok(view) => view.transaction,
            Err(e) if e.is_not_found() => return Err(not_found()),
            Err(e) => return Err(e.into()),
        }
    };
    if tx.id != id {
        return Err(MintError::Client(ClientError::Protocol {
            url: host,
            message: format!("answered transaction {} for {id}", tx.id),
        }));
    }
    Ok(tx)
}

fn replayed(ctx: &MintContext, id: &str, hop: u32) -> Result<HopReservation, MintError> {
    debug!(transaction = %id, hop, "hop already reserved");
    ctx.observe(|m| m.settlement.hops_replayed.inc());
    Ok(HopReservation {
        view: retrieve_transaction(ctx, id)?,
        created: false,
    })
}

async fn reserve_forwarded(ctx: &MintContext, id: &str, hop: u32) -> Result<HopReservation, MintError> {
    let hop_invalid = |message: String| MintError::invalid("hop_invalid", message);

    let index = offer_index_for_hop(hop).ok_or_else(|| hop_invalid(format!("hop {hop} is not a crossing hop")))?;
    let canonical = fetch_canonical(ctx, id).await?;
    let offer_id = canonical
        .path
        .get(index)
        .ok_or_else(|| hop_invalid(format!("transaction {id} has no hop {hop}")))?
        .clone();
    if !ctx.is_local(&ResourceId::parse(&offer_id)?.host()?) {
        return Err(hop_invalid(format!("offer {offer_id} is not hosted on {}", ctx.host)));
    }

    if ctx.store.crossing_for(&offer_id, id)?.is_some() {
        return replayed(ctx, id, hop);
    }

    let pair = Pair::parse(&canonical.pair)?;
    let offers = load_offers(ctx, &canonical.path[index..]).await?;
    check_path(&pair, &offers, index).map_err(path_invalid)?;
    let chain = compute_chain(&offers, &canonical.amount)?;
    let walk = Walk {
        tx: &canonical,
        pair: &pair,
        offers: &offers,
        start: index,
        chain: &chain,
    };

    let applied = ctx.store.atomically(|txn| -> Result<_, MintError> {
        if txn.crossing_for(&offer_id, id)?.is_some() {
            return Ok(None);
        }
        match txn.transaction(id)? {
            Some(local) if local.lock != canonical.lock => {
                return Err(MintError::conflict(
                    "transaction_lock_mismatch",
                    format!("local copy of {id} carries a different lock"),
                ));
            }
            Some(_) => {}
            None => {
                let copy = Transaction {
                    propagation: Propagation::Propagated,
                    ..canonical.clone()
                };
                txn.put_transaction(&copy)?;
            }
        }
        write_legs(txn, ctx, &walk, false).map(Some)
    })?;

    let Some(next) = applied else {
        return replayed(ctx, id, hop);
    };
    info!(transaction = %id, hop, "hop reserved");

    if let Some((host, next_hop)) = next {
        forward(ctx, id, &host, next_hop).await?;
    }
    Ok(HopReservation {
        view: retrieve_transaction(ctx, id)?,
        created: true,
    })
}

/// Returns the transaction as recorded on this mint, with the operations
/// and crossings stored here.
pub fn retrieve_transaction(ctx: &MintContext, id: &str) -> Result<TransactionView, MintError> {
    ctx.store.transaction_view(id)?.ok_or_else(|| {
        MintError::not_found("transaction_not_found", format!("transaction {id} not found"))
    })
}

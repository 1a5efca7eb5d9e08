//! Crossing engine.
//!
//! Given the offers of a transaction path (source to destination) and the
//! amount the destination must receive, computes how much crosses each
//! offer. The path is walked from the destination back to the source: the
//! amount needed after offer `k` is converted through its price with
//! `ceil(need * base_price / quote_price)`, which becomes both the amount
//! crossing offer `k` and the amount needed before it. Rounding up keeps
//! offer owners from being under-paid.
//!
//! Hop layout of a transaction with `n` offers:
//!
//! - leg `j` (operation from the `j`-th participant to the next) is hop `2j`,
//! - the crossing of offer `k` (0-based) is hop `2k + 1`.
//!
//! The engine is pure: it never touches storage. Remainder checks are
//! repeated inside the unit of work that decrements them.

use std::collections::HashSet;

use thiserror::Error;

use crate::types::{Amount, Offer, Pair};

/// Hop of the operation for leg `j`.
pub fn operation_hop(leg: usize) -> u32 {
    (2 * leg) as u32
}

/// Hop of the crossing of offer `k` (0-based position in the path).
pub fn crossing_hop(offer: usize) -> u32 {
    (2 * offer + 1) as u32
}

/// Inverse of [`crossing_hop`]: the path position crossed at `hop`, if
/// `hop` is a crossing hop.
pub fn offer_index_for_hop(hop: u32) -> Option<usize> {
    if hop % 2 == 1 {
        Some(((hop - 1) / 2) as usize)
    } else {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainLink {
    pub offer: String,
    /// Amount crossing the offer, in units of its quote asset.
    pub amount: Amount,
}

/// Output of [`compute_chain`]: one link per offer, in path order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    pub links: Vec<ChainLink>,
    pub destination_amount: Amount,
}

impl Chain {
    /// Amount of the first, owner-side operation.
    pub fn source_amount(&self) -> &Amount {
        self.links
            .first()
            .map_or(&self.destination_amount, |link| &link.amount)
    }

    /// Amount moved by leg `j` relative to the start of this chain.
    pub fn leg_amount(&self, leg: usize) -> &Amount {
        self.links
            .get(leg)
            .map_or(&self.destination_amount, |link| &link.amount)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CrossingError {
    #[error("offer {offer} at position {index} is not active")]
    OfferInactive { index: usize, offer: String },

    #[error("offer {offer} at position {index} needs {needed} but only {remainder} remains")]
    InsufficientRemainder {
        index: usize,
        offer: String,
        needed: Amount,
        remainder: Amount,
    },
}

impl CrossingError {
    pub fn index(&self) -> usize {
        match self {
            CrossingError::OfferInactive { index, .. }
            | CrossingError::InsufficientRemainder { index, .. } => *index,
        }
    }
}

/// Computes the amount crossing each offer of `path`.
///
/// All offers are evaluated; when several are unusable the error reports
/// the one closest to the source.
pub fn compute_chain(path: &[Offer], destination_amount: &Amount) -> Result<Chain, CrossingError> {
    let mut need = destination_amount.clone();
    let mut amounts = Vec::with_capacity(path.len());
    let mut first_error: Option<CrossingError> = None;

    for (index, offer) in path.iter().enumerate().rev() {
        let amount = need.mul_div_ceil(&offer.base_price, &offer.quote_price);
        if !offer.is_active() {
            first_error = Some(CrossingError::OfferInactive {
                index,
                offer: offer.id.clone(),
            });
        } else if amount > offer.remainder {
            first_error = Some(CrossingError::InsufficientRemainder {
                index,
                offer: offer.id.clone(),
                needed: amount.clone(),
                remainder: offer.remainder.clone(),
            });
        }
        amounts.push(amount.clone());
        need = amount;
    }

    if let Some(err) = first_error {
        return Err(err);
    }

    amounts.reverse();
    let links = path
        .iter()
        .zip(amounts)
        .map(|(offer, amount)| ChainLink {
            offer: offer.id.clone(),
            amount,
        })
        .collect();

    Ok(Chain {
        links,
        destination_amount: destination_amount.clone(),
    })
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path offer {0} appears more than once")]
    DuplicateOffer(String),

    #[error("direct transfer requires identical base and quote assets")]
    DirectPairMismatch,

    #[error("path offer {offer} at position {index} does not chain: expected {expected}, found {found}")]
    Discontinuous {
        index: usize,
        offer: String,
        expected: String,
        found: String,
    },
}

/// Checks that a (possibly partial) path chains the transaction pair.
///
/// `offers` is a suffix of the full path starting at position `start`. The
/// first offer must take the pair's base asset as quote only when the
/// suffix is the full path. Each offer's base asset must be the next
/// offer's quote asset, and the last base asset must be the pair's quote.
pub fn check_path(pair: &Pair, offers: &[Offer], start: usize) -> Result<(), PathError> {
    let mut seen = HashSet::new();
    for offer in offers {
        if !seen.insert(offer.id.as_str()) {
            return Err(PathError::DuplicateOffer(offer.id.clone()));
        }
    }

    let base = pair.base.to_string();
    let quote = pair.quote.to_string();

    if offers.is_empty() {
        if start == 0 && base != quote {
            return Err(PathError::DirectPairMismatch);
        }
        return Ok(());
    }

    let discontinuous = |i: usize, expected: &str, found: &str| PathError::Discontinuous {
        index: start + i,
        offer: offers[i].id.clone(),
        expected: expected.to_string(),
        found: found.to_string(),
    };

    if start == 0 && offers[0].quote_asset != base {
        return Err(discontinuous(0, &base, &offers[0].quote_asset));
    }
    for i in 1..offers.len() {
        if offers[i].quote_asset != offers[i - 1].base_asset {
            return Err(discontinuous(i, &offers[i - 1].base_asset, &offers[i].quote_asset));
        }
    }
    let last = offers.len() - 1;
    if offers[last].base_asset != quote {
        return Err(discontinuous(last, &quote, &offers[last].base_asset));
    }
    Ok(())
}

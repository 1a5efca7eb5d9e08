//! Records persisted by a mint.
//!
//! Each record is identified by a resource id of the form `owner:token`.
//! The mint hosting `owner` holds the canonical copy; other mints may keep
//! propagated replicas (see [`Propagation`]).

use serde::{Deserialize, Serialize};

use super::Amount;
use super::address::{AssetName, Pair, ParseError, Price, ResourceId};

/// Whether a stored record is the authoritative copy or a replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    Canonical,
    Propagated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    Closed,
    Consumed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Reserved,
    Settled,
    Canceled,
}

/// An asset issued by a local user. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub created: u64,
    pub owner: String,
    /// Fully qualified name, `owner[CODE.SCALE]`.
    pub name: String,
    pub code: String,
    pub scale: u8,
}

impl Asset {
    pub fn asset_name(&self) -> AssetName {
        AssetName {
            issuer: self.owner.clone(),
            code: self.code.clone(),
            scale: self.scale,
        }
    }
}

/// A standing willingness to exchange assets.
///
/// The owner gives `base_asset` and receives up to `amount` of
/// `quote_asset`, at the ratio `base_price : quote_price`. `remainder` is
/// the quote amount still available and only ever decreases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub created: u64,
    pub owner: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub base_price: Amount,
    pub quote_price: Amount,
    pub amount: Amount,
    pub status: OfferStatus,
    pub remainder: Amount,
    pub propagation: Propagation,
}

impl Offer {
    pub fn pair(&self) -> Result<Pair, ParseError> {
        Ok(Pair {
            base: AssetName::parse(&self.base_asset)?,
            quote: AssetName::parse(&self.quote_asset)?,
        })
    }

    pub fn price(&self) -> Price {
        Price {
            base: self.base_price.clone(),
            quote: self.quote_price.clone(),
        }
    }

    pub fn resource_id(&self) -> Result<ResourceId, ParseError> {
        ResourceId::parse(&self.id)
    }

    pub fn is_active(&self) -> bool {
        self.status == OfferStatus::Active
    }
}

/// An end-to-end value transfer along a path of offers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub created: u64,
    pub owner: String,
    pub pair: String,
    pub amount: Amount,
    pub destination: String,
    /// Offer ids in traversal order, source to destination.
    pub path: Vec<String>,
    pub status: TransactionStatus,
    /// Correlation token shared by every mint's copy of this transaction.
    pub lock: String,
    pub propagation: Propagation,
}

/// One mint-local leg of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub created: u64,
    pub owner: String,
    pub asset: String,
    pub source: String,
    pub destination: String,
    pub amount: Amount,
    pub status: TransactionStatus,
    pub transaction: String,
    pub transaction_hop: u32,
    pub propagation: Propagation,
}

/// Record of a transaction hop consuming part of an offer's remainder.
///
/// At most one crossing exists per `(offer, transaction)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossing {
    pub id: String,
    pub created: u64,
    pub owner: String,
    pub offer: String,
    pub amount: Amount,
    pub status: TransactionStatus,
    pub transaction: String,
    pub transaction_hop: u32,
}

/// A transaction together with the operations and crossings this mint
/// recorded for it, ordered by hop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub operations: Vec<Operation>,
    pub crossings: Vec<Crossing>,
}

//! Core domain types used by the ledger.
//!
//! This module defines the arbitrary-precision [`Amount`] used for every
//! quantity and price, token generation for resource identifiers, and the
//! records a mint persists: assets, offers, transactions, operations and
//! crossings. The goal is to avoid "naked" strings and integers in public
//! APIs and instead use domain-specific types.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::Zero;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod address;
pub mod records;

pub use address::{
    Address, AssetName, Pair, ParseError, Price, ResourceId, host_of, normalize_address, parse_code,
    parse_scale,
};
pub use records::{
    Asset, Crossing, Offer, OfferStatus, Operation, Propagation, Transaction, TransactionStatus,
    TransactionView,
};

/// Non-negative arbitrary-precision integer quantity.
///
/// Amounts are expressed in the smallest unit of an asset (the asset's
/// scale is a presentation concern). On the wire and in JSON they are
/// rendered as decimal strings so that no precision is lost.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigUint);

impl Amount {
    /// Parses a decimal string of ASCII digits.
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError(s.to_string()));
        }
        BigUint::from_str(s)
            .map(Amount)
            .map_err(|_| AmountError(s.to_string()))
    }

    pub fn zero() -> Self {
        Amount(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `self - other`, or `None` if the result would be negative.
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.0 < other.0 {
            None
        } else {
            Some(Amount(&self.0 - &other.0))
        }
    }

    /// Returns `ceil(self * numerator / denominator)`.
    ///
    /// `denominator` must be non-zero; prices are validated at parse time.
    pub fn mul_div_ceil(&self, numerator: &Amount, denominator: &Amount) -> Amount {
        let product = &self.0 * &numerator.0;
        Amount(Integer::div_ceil(&product, &denominator.0))
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Amount(BigUint::from(v))
    }
}

impl Add for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Error returned when a string is not a valid [`Amount`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount: {0}")]
pub struct AmountError(pub String);

/// Generates a fresh random token of the form `<kind>_<32 hex chars>`.
///
/// Tokens are unique per owner with overwhelming probability and are
/// combined with an owner address to form resource ids.
pub fn new_token(kind: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{kind}_{}", hex::encode(bytes))
}

/// Builds a fresh resource id `owner:<kind>_<random>`.
pub fn new_id(owner: &str, kind: &str) -> String {
    ResourceId::new(owner, new_token(kind)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_parses_decimal_digits_only() {
        assert_eq!(Amount::parse("10").unwrap(), Amount::from(10));
        assert!(Amount::parse("").is_err());
        assert!(Amount::parse("-1").is_err());
        assert!(Amount::parse("1.5").is_err());
        assert!(Amount::parse("+3").is_err());

        let huge = "340282366920938463463374607431768211456000";
        assert_eq!(Amount::parse(huge).unwrap().to_string(), huge);
    }

    #[test]
    fn mul_div_ceil_rounds_up() {
        let ten = Amount::from(10);
        assert_eq!(
            ten.mul_div_ceil(&Amount::from(100), &Amount::from(98)),
            Amount::from(11)
        );
        assert_eq!(
            ten.mul_div_ceil(&Amount::from(100), &Amount::from(100)),
            Amount::from(10)
        );
        assert_eq!(
            Amount::from(11).mul_div_ceil(&Amount::from(100), &Amount::from(120)),
            Amount::from(10)
        );
        assert_eq!(
            Amount::zero().mul_div_ceil(&Amount::from(3), &Amount::from(7)),
            Amount::zero()
        );
    }

    #[test]
    fn checked_sub_never_goes_negative() {
        let a = Amount::from(5);
        let b = Amount::from(7);
        assert_eq!(a.checked_sub(&b), None);
        assert_eq!(b.checked_sub(&a), Some(Amount::from(2)));
        assert_eq!(&a + &b, Amount::from(12));
    }

    #[test]
    fn amount_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Amount::from(42)).unwrap();
        assert_eq!(json, "\"42\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Amount::from(42));
        assert!(serde_json::from_str::<Amount>("\"4x\"").is_err());
    }

    #[test]
    fn tokens_are_prefixed_and_distinct() {
        let a = new_token("offer");
        let b = new_token("offer");
        assert!(a.starts_with("offer_"));
        assert_eq!(a.len(), "offer_".len() + 32);
        assert_ne!(a, b);

        let id = new_id("kurt@mint.example.com", "transaction");
        let parsed = ResourceId::parse(&id).expect("generated id parses");
        assert_eq!(parsed.owner, "kurt@mint.example.com");
    }
}

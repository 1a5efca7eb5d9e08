//! Address, asset-name and resource-id grammar.
//!
//! Every identifier exchanged between mints is a plain string. This module
//! turns those strings into structured values (or a descriptive
//! [`ParseError`]) and back:
//!
//! - addresses: `username[+tag]@host[:port]`,
//! - asset names: `issuer-address[CODE.SCALE]`,
//! - pairs: `base-asset-name/quote-asset-name`,
//! - prices: `base_price/quote_price`,
//! - resource ids: `address:token`.
//!
//! All functions here are pure; none of them consult storage or the network.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::Amount;

/// Maximum length of the local (username) part of an address.
pub const MAX_USERNAME_LEN: usize = 256;

/// Maximum length of an asset code.
pub const MAX_CODE_LEN: usize = 64;

const USERNAME: &str = r"([a-zA-Z0-9\-_.]{1,256})";
const TAG: &str = r"(?:\+([a-zA-Z0-9\-_.]+))?";
const HOST: &str = r"([a-zA-Z0-9\-]+\.[a-zA-Z0-9\-.]+(?::[0-9]{1,5})?)";

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{USERNAME}{TAG}@{HOST}$")).expect("address grammar should compile")
});

static ASSET_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^{USERNAME}{TAG}@{HOST}\[([A-Z0-9\-]{{1,64}})\.([0-9]{{1,2}})\]$"
    ))
    .expect("asset name grammar should compile")
});

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]{1,256}$").expect("token grammar should compile"));

static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9\-]{1,64}$").expect("code grammar should compile"));

/// Errors produced by the identifier grammar.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("invalid asset name: {0}")]
    AssetName(String),
    #[error("invalid asset pair: {0}")]
    Pair(String),
    #[error("invalid price: {0}")]
    Price(String),
    #[error("invalid id: {0}")]
    ResourceId(String),
    #[error("invalid asset code: {0}")]
    Code(String),
    #[error("invalid asset scale: {0}")]
    Scale(String),
}

/// A parsed mint address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    pub username: String,
    pub tag: Option<String>,
    /// Host of the mint authoritative for this user, including an explicit
    /// port when one was given.
    pub host: String,
}

impl Address {
    /// Parses `username[+tag]@host[:port]`.
    pub fn parse(address: &str) -> Result<Self, ParseError> {
        let caps = ADDRESS_RE
            .captures(address)
            .ok_or_else(|| ParseError::Address(address.to_string()))?;

        Ok(Self {
            username: caps[1].to_string(),
            tag: caps.get(2).map(|m| m.as_str().to_string()),
            host: caps[3].to_string(),
        })
    }

    /// Builds the address of a local user.
    pub fn local(username: &str, host: &str) -> Result<Self, ParseError> {
        Self::parse(&format!("{username}@{host}"))
    }

    /// Returns the address without its `+tag` part.
    pub fn normalized(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}+{}@{}", self.username, tag, self.host),
            None => write!(f, "{}@{}", self.username, self.host),
        }
    }
}

/// Extracts `(username, host)` from an address.
pub fn username_and_host(address: &str) -> Result<(String, String), ParseError> {
    let addr = Address::parse(address)?;
    Ok((addr.username, addr.host))
}

/// Returns the host of the mint authoritative for `address`.
pub fn host_of(address: &str) -> Result<String, ParseError> {
    Address::parse(address).map(|a| a.host)
}

/// Returns `address` with any `+tag` part removed.
pub fn normalize_address(address: &str) -> Result<String, ParseError> {
    Address::parse(address).map(|a| a.normalized())
}

/// A parsed asset name, `issuer[CODE.SCALE]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssetName {
    /// Normalized issuer address.
    pub issuer: String,
    pub code: String,
    pub scale: u8,
}

impl AssetName {
    pub fn parse(name: &str) -> Result<Self, ParseError> {
        let caps = ASSET_NAME_RE
            .captures(name)
            .ok_or_else(|| ParseError::AssetName(name.to_string()))?;

        let scale = caps[5]
            .parse::<u8>()
            .map_err(|_| ParseError::AssetName(name.to_string()))?;

        Ok(Self {
            issuer: format!("{}@{}", &caps[1], &caps[3]),
            code: caps[4].to_string(),
            scale,
        })
    }

    /// Host of the issuer's mint.
    pub fn issuer_host(&self) -> Result<String, ParseError> {
        host_of(&self.issuer)
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}.{}]", self.issuer, self.code, self.scale)
    }
}

/// A parsed `base/quote` asset pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    pub base: AssetName,
    pub quote: AssetName,
}

impl Pair {
    pub fn parse(pair: &str) -> Result<Self, ParseError> {
        let (base, quote) = pair
            .split_once('/')
            .ok_or_else(|| ParseError::Pair(pair.to_string()))?;
        if quote.contains('/') {
            return Err(ParseError::Pair(pair.to_string()));
        }
        let base = AssetName::parse(base).map_err(|_| ParseError::Pair(pair.to_string()))?;
        let quote = AssetName::parse(quote).map_err(|_| ParseError::Pair(pair.to_string()))?;
        Ok(Self { base, quote })
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A parsed `base_price/quote_price` exchange ratio.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Price {
    pub base: Amount,
    pub quote: Amount,
}

impl Price {
    /// Parses a price; both sides must be strictly positive integers.
    pub fn parse(price: &str) -> Result<Self, ParseError> {
        let err = || ParseError::Price(price.to_string());
        let (base, quote) = price.split_once('/').ok_or_else(err)?;
        let base = Amount::parse(base).map_err(|_| err())?;
        let quote = Amount::parse(quote).map_err(|_| err())?;
        if base.is_zero() || quote.is_zero() {
            return Err(err());
        }
        Ok(Self { base, quote })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A parsed `address:token` resource identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Normalized owner address.
    pub owner: String,
    pub token: String,
}

impl ResourceId {
    /// Parses an id, splitting on the last `:` so that hosts with an
    /// explicit port stay intact.
    pub fn parse(id: &str) -> Result<Self, ParseError> {
        let err = || ParseError::ResourceId(id.to_string());
        let (address, token) = id.rsplit_once(':').ok_or_else(err)?;
        if !TOKEN_RE.is_match(token) {
            return Err(err());
        }
        let owner = normalize_address(address).map_err(|_| err())?;
        Ok(Self {
            owner,
            token: token.to_string(),
        })
    }

    pub fn new(owner: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            token: token.into(),
        }
    }

    /// Host of the owner's mint.
    pub fn host(&self) -> Result<String, ParseError> {
        host_of(&self.owner)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.token)
    }
}

/// Validates an asset code supplied at asset creation.
pub fn parse_code(code: &str) -> Result<String, ParseError> {
    if CODE_RE.is_match(code) {
        Ok(code.to_string())
    } else {
        Err(ParseError::Code(code.to_string()))
    }
}

/// Validates an asset scale supplied at asset creation (0 to 99).
pub fn parse_scale(scale: &str) -> Result<u8, ParseError> {
    let err = || ParseError::Scale(scale.to_string());
    if scale.is_empty() || scale.len() > 2 || !scale.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    scale.parse::<u8>().map_err(|_| err())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_tagged_addresses() {
        let a = Address::parse("kurt@mint.example.com").expect("plain address");
        assert_eq!(a.username, "kurt");
        assert_eq!(a.tag, None);
        assert_eq!(a.host, "mint.example.com");

        let b = Address::parse("kurt+savings@mint.example.com").expect("tagged address");
        assert_eq!(b.tag.as_deref(), Some("savings"));
        assert_eq!(b.normalized(), "kurt@mint.example.com");
        assert_eq!(b.to_string(), "kurt+savings@mint.example.com");
    }

    #[test]
    fn addresses_accept_hosts_with_ports() {
        let (user, host) = username_and_host("alan_1@127.0.0.1:40123").expect("host with port");
        assert_eq!(user, "alan_1");
        assert_eq!(host, "127.0.0.1:40123");
    }

    #[test]
    fn address_local_part_length_boundaries() {
        let max = "a".repeat(MAX_USERNAME_LEN);
        assert!(Address::parse(&format!("{max}@mint.example.com")).is_ok());

        let too_long = "a".repeat(MAX_USERNAME_LEN + 1);
        assert!(Address::parse(&format!("{too_long}@mint.example.com")).is_err());

        assert!(Address::parse("@mint.example.com").is_err());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "kurt",
            "kurt@",
            "kurt@localhost",
            "ku rt@mint.example.com",
            "kurt@@mint.example.com",
            "kurt+@mint.example.com",
            "kurt@mint.example.com:123456",
        ] {
            assert!(Address::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn parses_asset_names() {
        let a = AssetName::parse("kurt+x@mint.example.com[USD.2]").expect("asset name");
        assert_eq!(a.issuer, "kurt@mint.example.com");
        assert_eq!(a.code, "USD");
        assert_eq!(a.scale, 2);
        assert_eq!(a.to_string(), "kurt@mint.example.com[USD.2]");

        let b = AssetName::parse("kurt@127.0.0.1:9000[EUR-X.0]").expect("asset with port");
        assert_eq!(b.issuer_host().unwrap(), "127.0.0.1:9000");
    }

    #[test]
    fn asset_scale_is_one_or_two_digits() {
        assert!(AssetName::parse("kurt@mint.example.com[USD.0]").is_ok());
        assert!(AssetName::parse("kurt@mint.example.com[USD.99]").is_ok());
        assert!(AssetName::parse("kurt@mint.example.com[USD.100]").is_err());
        assert!(AssetName::parse("kurt@mint.example.com[USD.]").is_err());
        assert!(AssetName::parse("kurt@mint.example.com[usd.2]").is_err());
    }

    #[test]
    fn asset_code_length_boundaries() {
        let max = "A".repeat(MAX_CODE_LEN);
        assert!(AssetName::parse(&format!("kurt@mint.example.com[{max}.2]")).is_ok());
        let too_long = "A".repeat(MAX_CODE_LEN + 1);
        assert!(AssetName::parse(&format!("kurt@mint.example.com[{too_long}.2]")).is_err());

        assert!(parse_code(&max).is_ok());
        assert!(parse_code(&too_long).is_err());
        assert!(parse_code("U/S[D").is_err());
        assert!(parse_code("").is_err());
    }

    #[test]
    fn parses_pairs() {
        let p = Pair::parse("a@m1.example.com[USD.2]/b@m2.example.com[USD.2]").expect("pair");
        assert_eq!(p.base.issuer, "a@m1.example.com");
        assert_eq!(p.quote.issuer, "b@m2.example.com");
        assert_eq!(
            p.to_string(),
            "a@m1.example.com[USD.2]/b@m2.example.com[USD.2]"
        );

        assert!(Pair::parse("a@m1.example.com[USD.2]").is_err());
        assert!(Pair::parse("a@m1.example.com[USD.2]/b@m2.example.com[USD.2]/x").is_err());
    }

    #[test]
    fn parses_prices() {
        let p = Price::parse("100/98").expect("price");
        assert_eq!(p.base, Amount::from(100u64));
        assert_eq!(p.quote, Amount::from(98u64));

        assert!(Price::parse("0/1").is_err());
        assert!(Price::parse("1/0").is_err());
        assert!(Price::parse("100").is_err());
        assert!(Price::parse("-1/2").is_err());
    }

    #[test]
    fn parses_resource_ids_on_last_colon() {
        let id = ResourceId::parse("kurt+t@127.0.0.1:8000:offer_abc123").expect("id");
        assert_eq!(id.owner, "kurt@127.0.0.1:8000");
        assert_eq!(id.token, "offer_abc123");
        assert_eq!(id.host().unwrap(), "127.0.0.1:8000");
        assert_eq!(id.to_string(), "kurt@127.0.0.1:8000:offer_abc123");

        assert!(ResourceId::parse("kurt@mint.example.com").is_err());
        assert!(ResourceId::parse("kurt@mint.example.com:").is_err());
        assert!(ResourceId::parse("nobody:offer_1").is_err());
    }

    #[test]
    fn scale_parsing_rejects_overflowing_input() {
        assert_eq!(parse_scale("2"), Ok(2));
        assert_eq!(parse_scale("99"), Ok(99));
        assert!(parse_scale("221323132122").is_err());
        assert!(parse_scale("").is_err());
        assert!(parse_scale("-1").is_err());
    }
}

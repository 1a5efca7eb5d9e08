//! Clients used by a mint to talk to other mints.
//!
//! The [`MintClient`] trait is the whole peer-to-peer surface: fetching the
//! canonical copy of an offer, transaction or operation from the mint that
//! owns it, asking a mint to reserve its hop of a transaction, and pushing
//! a propagation notice for a record. Target hosts are resolved from the
//! owner part of resource ids.
//!
//! Clients never retry. Every failure (unreachable peer, non-2xx answer,
//! malformed body) surfaces as a [`ClientError`]; background tasks treat
//! all of them as retryable, while synchronous callers may inspect the
//! peer's status and error code.
//!
//! Two implementations are provided:
//!
//! - [`http::HttpMintClient`] for real deployments,
//! - [`loopback::LoopbackNetwork`] which routes calls to in-process mints
//!   and is used for multi-mint tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Offer, Operation, ParseError, TransactionView};

pub mod http;
pub mod loopback;

pub use self::http::HttpMintClient;
pub use self::loopback::LoopbackNetwork;

/// Kind of record a propagation notice refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Offer,
    Operation,
}

impl Resource {
    /// Collection path the receiving mint serves for this resource.
    pub fn collection(&self) -> &'static str {
        match self {
            Resource::Offer => "offers",
            Resource::Operation => "operations",
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot resolve peer for {0}")]
    Target(#[from] ParseError),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The peer answered with a non-2xx status.
    #[error("{url} answered {status} {code}: {message}")]
    Status {
        url: String,
        status: u16,
        code: String,
        message: String,
    },

    #[error("malformed response from {url}: {message}")]
    Protocol { url: String, message: String },
}

impl ClientError {
    /// Status reported by the peer, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the peer answered 404 for the requested record.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the peer refused the request on its merits (4xx).
    pub fn is_rejection(&self) -> bool {
        matches!(self.status(), Some(s) if (400..500).contains(&s))
    }
}

/// Peer-to-peer surface between mints.
#[async_trait]
pub trait MintClient: Send + Sync {
    /// Fetches an offer from the mint hosting its owner.
    async fn fetch_offer(&self, id: &str) -> Result<Offer, ClientError>;

    /// Fetches a transaction (with that mint's legs) from the mint hosting
    /// its owner.
    async fn fetch_transaction(&self, id: &str) -> Result<TransactionView, ClientError>;

    /// Fetches an operation from the mint hosting its owner.
    async fn fetch_operation(&self, id: &str) -> Result<Operation, ClientError>;

    /// Asks `host` to reserve transaction `id` from crossing hop `hop`.
    async fn reserve_hop(&self, host: &str, id: &str, hop: u32) -> Result<TransactionView, ClientError>;

    /// Notifies `host` that the canonical copy of `id` changed.
    async fn push_propagation(&self, resource: Resource, id: &str, host: &str) -> Result<(), ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_covers_client_errors_only() {
        let status = |status: u16| ClientError::Status {
            url: "https://m1.example.com:2406/offers/x".to_string(),
            status,
            code: "offer_not_found".to_string(),
            message: "not found".to_string(),
        };
        assert!(status(404).is_not_found());
        assert!(status(402).is_rejection());
        assert!(!status(500).is_rejection());

        let transport = ClientError::Transport {
            url: "https://m1.example.com:2406".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(transport.status(), None);
        assert!(!transport.is_rejection());
    }

    #[test]
    fn resources_map_to_collections() {
        assert_eq!(Resource::Offer.collection(), "offers");
        assert_eq!(Resource::Operation.collection(), "operations");
    }
}

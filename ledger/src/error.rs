//! Error taxonomy for mint operations.
//!
//! Errors fall into four groups:
//!
//! - validation errors (malformed input, 400),
//! - business-rule errors (crossing rejected 402, unknown resource 404,
//!   conflicting copies 409),
//! - infrastructure errors (storage, peer unreachable, 500),
//!
//! Every variant maps to an HTTP status and a stable snake_case error code
//! that peers and clients can match on.

use thiserror::Error;

use crate::client::ClientError;
use crate::crossing::CrossingError;
use crate::storage::StorageError;
use crate::types::{AmountError, ParseError};

#[derive(Debug, Error)]
pub enum MintError {
    /// Malformed or inconsistent input.
    #[error("{message}")]
    Invalid { code: &'static str, message: String },

    /// The crossing engine (or a downstream mint) rejected the reservation.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    /// A local copy disagrees with the canonical record.
    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("peer error: {0}")]
    Client(#[from] ClientError),
}

impl MintError {
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        MintError::Invalid {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        MintError::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        MintError::Conflict {
            code,
            message: message.into(),
        }
    }

    /// HTTP status this error is reported with.
    pub fn status(&self) -> u16 {
        match self {
            MintError::Invalid { .. } => 400,
            MintError::TransactionFailed(_) => 402,
            MintError::NotFound { .. } => 404,
            MintError::Conflict { .. } => 409,
            MintError::Storage(_) | MintError::Client(_) => 500,
        }
    }

    /// Stable error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            MintError::Invalid { code, .. }
            | MintError::NotFound { code, .. }
            | MintError::Conflict { code, .. } => code,
            MintError::TransactionFailed(_) => "transaction_failed",
            MintError::Storage(_) | MintError::Client(_) => "internal_error",
        }
    }

    /// Infrastructure errors are worth retrying from background tasks.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MintError::Storage(_) | MintError::Client(_))
    }
}

impl From<CrossingError> for MintError {
    fn from(e: CrossingError) -> Self {
        MintError::TransactionFailed(e.to_string())
    }
}

impl From<ParseError> for MintError {
    fn from(e: ParseError) -> Self {
        let code = match &e {
            ParseError::Address(_) => "address_invalid",
            ParseError::AssetName(_) | ParseError::Pair(_) => "pair_invalid",
            ParseError::Price(_) => "price_invalid",
            ParseError::ResourceId(_) => "id_invalid",
            ParseError::Code(_) => "code_invalid",
            ParseError::Scale(_) => "scale_invalid",
        };
        MintError::invalid(code, e.to_string())
    }
}

impl From<AmountError> for MintError {
    fn from(e: AmountError) -> Self {
        MintError::invalid("amount_invalid", e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_map_to_validation_codes() {
        let err: MintError = ParseError::Scale("221323132122".to_string()).into();
        assert_eq!(err.status(), 400);
        assert_eq!(err.code(), "scale_invalid");

        let err: MintError = ParseError::Pair("x".to_string()).into();
        assert_eq!(err.code(), "pair_invalid");
        assert!(!err.is_retryable());
    }

    #[test]
    fn crossing_rejection_is_payment_required() {
        let err: MintError = CrossingError::OfferInactive {
            index: 0,
            offer: "alan@m1.example.com:offer_1".to_string(),
        }
        .into();
        assert_eq!(err.status(), 402);
        assert_eq!(err.code(), "transaction_failed");
    }

    #[test]
    fn infrastructure_errors_are_retryable() {
        let err: MintError = StorageError::Poisoned.into();
        assert_eq!(err.status(), 500);
        assert_eq!(err.code(), "internal_error");
        assert!(err.is_retryable());
    }
}

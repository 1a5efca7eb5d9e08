//! Error responses.
//!
//! Every failure is rendered as
//!
//! ```json
//! { "error": { "err_code": "offer_not_found", "message": "..." } }
//! ```
//!
//! with the status of the underlying [`MintError`]. Infrastructure errors
//! are logged here and reported with a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use ledger::MintError;

#[derive(Debug)]
pub enum ApiError {
    /// The request carried no authenticated user.
    Unauthorized,
    /// A form field is missing.
    MissingField(&'static str),
    Mint(MintError),
    /// A response body could not be encoded.
    Encode(serde_json::Error),
}

impl From<MintError> for ApiError {
    fn from(e: MintError) -> Self {
        ApiError::Mint(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Encode(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing authenticated user".to_string(),
            ),
            ApiError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                "field_missing",
                format!("missing form field `{field}`"),
            ),
            ApiError::Mint(e) => {
                let status =
                    StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!(error = %e, "request failed");
                    (status, e.code(), "internal error".to_string())
                } else {
                    (status, e.code(), e.to_string())
                }
            }
            ApiError::Encode(e) => {
                tracing::error!(error = %e, "response encoding failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };
        (
            status,
            Json(json!({ "error": { "err_code": code, "message": message } })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use ledger::StorageError;
    use serde_json::Value;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn business_errors_keep_code_and_message() {
        let (status, body) = render(ApiError::Mint(MintError::TransactionFailed(
            "offer at position 0 is not active".to_string(),
        )))
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"]["err_code"], "transaction_failed");
        assert!(body["error"]["message"].as_str().unwrap().contains("not active"));
    }

    #[tokio::test]
    async fn infrastructure_errors_are_hidden() {
        let (status, body) = render(ApiError::Mint(MintError::Storage(StorageError::Poisoned))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["err_code"], "internal_error");
        assert_eq!(body["error"]["message"], "internal error");
    }

    #[tokio::test]
    async fn encoding_failures_are_hidden() {
        let encode = serde_json::to_value(std::collections::BTreeMap::from([((1u8, 2u8), 3u8)]))
            .expect_err("tuple keys are not JSON");
        let (status, body) = render(ApiError::Encode(encode)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["err_code"], "internal_error");
        assert_eq!(body["error"]["message"], "internal error");
    }

    #[tokio::test]
    async fn missing_field_is_a_bad_request() {
        let (status, body) = render(ApiError::MissingField("pair")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["err_code"], "field_missing");
    }
}

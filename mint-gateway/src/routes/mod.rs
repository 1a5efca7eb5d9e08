//! Request handlers, one module per collection.
//!
//! Requests are form encoded and responses are JSON documents wrapping the
//! record in a field named after it (`{"offer": {...}}`).

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use serde::Serialize;
use serde_json::{Map, Value};

use ledger::Address;

use crate::error::ApiError;
use crate::state::SharedState;

pub mod assets;
pub mod health;
pub mod offers;
pub mod operations;
pub mod transactions;

/// Header carrying the local username authenticated by the fronting layer.
pub const USER_HEADER: &str = "x-mint-user";

/// Address of the authenticated caller, `username@<mint host>`.
pub struct Caller(pub String);

impl FromRequestParts<SharedState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthorized)?;
        let address = Address::local(username, &state.mint.host).map_err(|e| ApiError::Mint(e.into()))?;
        Ok(Caller(address.to_string()))
    }
}

/// Decoded form body. Keeps repeated keys, in order.
pub struct Fields(pub Vec<(String, String)>);

impl Fields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, name: &'static str) -> Result<String, ApiError> {
        self.get(name)
            .map(str::to_string)
            .ok_or(ApiError::MissingField(name))
    }

    /// Every value of a repeated field, accepting both `name[]` and `name`.
    pub fn all(&self, name: &str) -> Vec<String> {
        let bracketed = format!("{name}[]");
        self.0
            .iter()
            .filter(|(k, _)| *k == bracketed || k == name)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// Wraps `record` as `{ field: record }`.
pub fn envelope<T: Serialize>(field: &str, record: &T) -> Result<Value, ApiError> {
    let mut body = Map::new();
    body.insert(field.to_string(), serde_json::to_value(record)?);
    Ok(Value::Object(body))
}

/// `201 Created` for a first application, `200 OK` for a repeat.
pub fn created_status(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn envelope_wraps_record_under_field() {
        let body = envelope("asset", &serde_json::json!({ "code": "USD" })).expect("encodes");
        assert_eq!(body["asset"]["code"], "USD");
    }

    #[test]
    fn unencodable_record_is_an_error() {
        // JSON object keys must be strings.
        let record: BTreeMap<(u8, u8), u8> = BTreeMap::from([((1, 2), 3)]);
        assert!(matches!(envelope("asset", &record), Err(ApiError::Encode(_))));
    }

    #[test]
    fn repeated_fields_keep_their_order() {
        let fields = Fields(vec![
            ("path[]".to_string(), "a".to_string()),
            ("amount".to_string(), "10".to_string()),
            ("path[]".to_string(), "b".to_string()),
        ]);
        assert_eq!(fields.all("path"), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(fields.get("amount"), Some("10"));
        assert!(matches!(fields.require("pair"), Err(ApiError::MissingField("pair"))));
    }
}

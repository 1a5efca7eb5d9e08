//! HTTP client for peer mints.
//!
//! Peers expose the same JSON API as the public gateway. Responses are
//! wrapped in a named envelope:
//!
//! ```json
//! GET /offers/alan@m1.example.com:offer_1f...
//! { "offer": { "id": "alan@m1.example.com:offer_1f...", ... } }
//!
//! POST /transactions/kurt@m0.example.com:transaction_9a...   (form: hop=3)
//! { "transaction": { "id": "...", "operations": [...], "crossings": [...] } }
//! ```
//!
//! Errors come back as `{ "error": { "err_code": "...", "message": "..." } }`.
//!
//! A host carrying an explicit port (`127.0.0.1:38211`) is used as is;
//! otherwise the configured default port is appended.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ClientError, MintClient, Resource};
use crate::config::ClientConfig;
use crate::types::{Offer, Operation, ResourceId, TransactionView};

/// HTTP implementation of [`MintClient`].
///
/// The underlying `reqwest` client is async, pools connections, and is
/// cheap to clone; one instance is shared by every request handler and
/// background task of a mint.
#[derive(Clone)]
pub struct HttpMintClient {
    client: Client,
    scheme: String,
    port: u16,
}

impl HttpMintClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ClientError> {
        Self::with_timeout(&cfg.scheme, cfg.port, cfg.timeout())
    }

    pub fn with_timeout(scheme: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            scheme: scheme.to_string(),
            port,
        })
    }

    fn base_url(&self, host: &str) -> String {
        if host.contains(':') {
            format!("{}://{}", self.scheme, host)
        } else {
            format!("{}://{}:{}", self.scheme, host, self.port)
        }
    }

    fn endpoint(&self, host: &str, path: &str) -> String {
        format!("{}/{}", self.base_url(host), path.trim_start_matches('/'))
    }

    fn owner_endpoint(&self, collection: &str, id: &str) -> Result<String, ClientError> {
        let host = ResourceId::parse(id)?.host()?;
        Ok(self.endpoint(&host, &format!("{collection}/{id}")))
    }

    async fn get_enveloped<T: DeserializeOwned>(&self, url: String, field: &str) -> Result<T, ClientError> {
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        read_envelope(url, resp, field).await
    }
}

fn transport(url: &str, e: reqwest::Error) -> ClientError {
    ClientError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    }
}

/// Reads a response body, mapping non-2xx answers to
/// [`ClientError::Status`] and extracting `field` from the envelope.
async fn read_envelope<T: DeserializeOwned>(url: String, resp: Response, field: &str) -> Result<T, ClientError> {
    let status = resp.status();
    let body: Value = match resp.json().await {
        Ok(body) => body,
        Err(e) if status.is_success() => {
            return Err(ClientError::Protocol {
                url,
                message: format!("failed to parse JSON response: {e}"),
            });
        }
        Err(_) => Value::Null,
    };

    if !status.is_success() {
        let error = &body["error"];
        return Err(ClientError::Status {
            url,
            status: status.as_u16(),
            code: error["err_code"].as_str().unwrap_or("unknown").to_string(),
            message: error["message"].as_str().unwrap_or_default().to_string(),
        });
    }

    let Some(inner) = body.get(field) else {
        return Err(ClientError::Protocol {
            url,
            message: format!("missing `{field}` envelope"),
        });
    };
    serde_json::from_value(inner.clone()).map_err(|e| ClientError::Protocol {
        url,
        message: format!("invalid `{field}` payload: {e}"),
    })
}

#[async_trait]
impl MintClient for HttpMintClient {
    async fn fetch_offer(&self, id: &str) -> Result<Offer, ClientError> {
        let url = self.owner_endpoint("offers", id)?;
        self.get_enveloped(url, "offer").await
    }

    async fn fetch_transaction(&self, id: &str) -> Result<TransactionView, ClientError> {
        let url = self.owner_endpoint("transactions", id)?;
        self.get_enveloped(url, "transaction").await
    }

    async fn fetch_operation(&self, id: &str) -> Result<Operation, ClientError> {
        let url = self.owner_endpoint("operations", id)?;
        self.get_enveloped(url, "operation").await
    }

    async fn reserve_hop(&self, host: &str, id: &str, hop: u32) -> Result<TransactionView, ClientError> {
        let url = self.endpoint(host, &format!("transactions/{id}"));
        let resp = self
            .client
            .post(&url)
            .form(&[("hop", hop.to_string())])
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        read_envelope(url, resp, "transaction").await
    }

    async fn push_propagation(&self, resource: Resource, id: &str, host: &str) -> Result<(), ClientError> {
        let url = self.endpoint(host, &format!("{}/{id}", resource.collection()));
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        Err(ClientError::Status {
            url,
            status: status.as_u16(),
            code: body["error"]["err_code"].as_str().unwrap_or("unknown").to_string(),
            message: body["error"]["message"].as_str().unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpMintClient {
        HttpMintClient::new(&ClientConfig::default()).expect("build client")
    }

    #[test]
    fn endpoint_appends_default_port() {
        let c = client();
        assert_eq!(
            c.endpoint("m1.example.com", "/offers/x"),
            "https://m1.example.com:2406/offers/x"
        );
        assert_eq!(
            c.endpoint("127.0.0.1:38211", "transactions/y"),
            "https://127.0.0.1:38211/transactions/y"
        );
    }

    #[test]
    fn owner_endpoint_targets_the_owner_host() {
        let c = client();
        let url = c
            .owner_endpoint("offers", "alan@m1.example.com:offer_1")
            .expect("resolve owner");
        assert_eq!(
            url,
            "https://m1.example.com:2406/offers/alan@m1.example.com:offer_1"
        );
        assert!(matches!(
            c.owner_endpoint("offers", "not-an-id"),
            Err(ClientError::Target(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_peer_is_a_transport_error() {
        let c = HttpMintClient::with_timeout("http", 2406, Duration::from_millis(200))
            .expect("build client");
        let err = c
            .fetch_offer("alan@127.0.0.1:9:offer_1")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
    }
}

//! Gateway configuration.
//!
//! The gateway adds the identity of the mint and its HTTP listen address to
//! the ledger configuration. Everything is read from one TOML file:
//!
//! ```toml
//! host = "mint.example.com"
//! listen_addr = "0.0.0.0:2406"
//!
//! [storage]
//! backend = "rocksdb"
//!
//! [storage.rocksdb]
//! path = "data/mint-db"
//! ```
//!
//! The file is named by `MINT_CONFIG` (defaults apply when unset) and
//! `MINT_HOST` overrides the host.

use std::net::SocketAddr;

use serde::Deserialize;

use ledger::{ConfigError, LedgerConfig};

pub const CONFIG_ENV: &str = "MINT_CONFIG";
pub const HOST_ENV: &str = "MINT_HOST";

/// Configuration for one mint's HTTP gateway.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host this mint is authoritative for.
    pub host: String,
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    #[serde(flatten)]
    pub ledger: LedgerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:2406".to_string(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 2406)),
            ledger: LedgerConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads the configuration named by the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                Self::from_toml_str(&raw)?
            }
            Err(_) => Self::default(),
        };
        if let Ok(host) = std::env::var(HOST_ENV) {
            cfg.host = host;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::StorageBackend;

    #[test]
    fn gateway_and_ledger_sections_share_one_file() {
        let cfg = GatewayConfig::from_toml_str(
            r#"
            host = "m1.example.com"
            listen_addr = "127.0.0.1:8080"

            [storage]
            backend = "memory"

            [settlement]
            max_path_length = 4
            "#,
        )
        .expect("parse config");

        assert_eq!(cfg.host, "m1.example.com");
        assert_eq!(cfg.listen_addr.port(), 8080);
        assert_eq!(cfg.ledger.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.ledger.settlement.max_path_length, 4);
        assert_eq!(cfg.ledger.client.port, 2406);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = GatewayConfig::from_toml_str("").expect("parse config");
        assert_eq!(cfg.listen_addr.to_string(), "0.0.0.0:2406");
        assert_eq!(cfg.ledger.storage.backend, StorageBackend::Rocksdb);
    }
}

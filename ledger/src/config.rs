//! Top-level configuration for a mint's ledger.
//!
//! This module aggregates configuration for:
//!
//! - storage (in-memory or RocksDB),
//! - the peer client used to reach other mints (scheme, port, timeout),
//! - the background task scheduler (poll interval, concurrency),
//! - settlement limits (maximum path length),
//! - the metrics exporter (enable flag + listen address).
//!
//! Every struct has a `Default` impl and deserializes with
//! `#[serde(default)]`, so a config file only needs the keys it changes.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::storage::{InMemoryBackend, LedgerStore, RocksDbBackend, RocksDbConfig, StorageError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    #[default]
    Rocksdb,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub rocksdb: RocksDbConfig,
}

impl StorageConfig {
    /// Opens the configured backend and wraps it in a [`LedgerStore`].
    pub fn open(&self) -> Result<LedgerStore, StorageError> {
        Ok(match self.backend {
            StorageBackend::Memory => LedgerStore::new(Arc::new(InMemoryBackend::new())),
            StorageBackend::Rocksdb => LedgerStore::new(Arc::new(RocksDbBackend::open(&self.rocksdb)?)),
        })
    }
}

/// Configuration for the client used to call other mints.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `https` in production; tests use `http`.
    pub scheme: String,
    /// Port used when a host does not carry one.
    pub port: u16,
    pub timeout_ms: u64,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            port: 2406,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub poll_interval_ms: u64,
    /// Upper bound on task executions running at the same time.
    pub max_concurrency: usize,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 1_000,
            max_concurrency: 8,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub max_path_length: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { max_path_length: 16 }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9898)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level ledger configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub storage: StorageConfig,
    pub client: ClientConfig,
    pub scheduler: SchedulerConfig,
    pub settlement: SettlementConfig,
    pub metrics: MetricsConfig,
}

impl LedgerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.storage.backend, StorageBackend::Rocksdb);
        assert_eq!(cfg.client.scheme, "https");
        assert_eq!(cfg.client.port, 2406);
        assert_eq!(cfg.client.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.scheduler.poll_interval(), Duration::from_secs(1));
        assert_eq!(cfg.scheduler.max_concurrency, 8);
        assert_eq!(cfg.settlement.max_path_length, 16);
        assert_eq!(cfg.metrics.listen_addr.to_string(), "127.0.0.1:9898");
    }

    #[test]
    fn partial_toml_overrides_only_given_keys() {
        let cfg = LedgerConfig::from_toml_str(
            r#"
            [storage]
            backend = "memory"

            [client]
            scheme = "http"

            [scheduler]
            max_concurrency = 2
            "#,
        )
        .expect("parse config");

        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.client.scheme, "http");
        assert_eq!(cfg.client.port, 2406);
        assert_eq!(cfg.scheduler.max_concurrency, 2);
        assert_eq!(cfg.scheduler.poll_interval_ms, 1_000);
        assert!(cfg.storage.open().is_ok());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = LedgerConfig::from_toml_str("[storage]\nbackend = \"paper\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

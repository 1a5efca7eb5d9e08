//! Mint ledger crate.
//!
//! This crate implements a mint: the authority for the users and assets of
//! one host in a federated ledger. Mints exchange value by chaining offers
//! across hosts, each mint recording only the hops that involve its own
//! users.
//!
//! - strongly-typed domain records and identifiers (`types`),
//! - the pure crossing engine computing amounts along a path (`crossing`),
//! - the typed store with atomic units of work (`storage`),
//! - settlement operations and the hop reservation protocol (`settlement`),
//! - peer clients, over HTTP or in-process (`client`),
//! - durable background tasks and their scheduler (`tasks`),
//! - Prometheus-based metrics (`metrics`),
//! - and the node configuration (`config`).
//!
//! Binaries compose these pieces behind an HTTP gateway; tests run several
//! mints in one process over a [`LoopbackNetwork`].

pub mod client;
pub mod config;
pub mod context;
pub mod crossing;
pub mod error;
pub mod metrics;
pub mod settlement;
pub mod storage;
pub mod tasks;
pub mod types;

// Re-export top-level configuration types.
pub use config::{
    ClientConfig, ConfigError, LedgerConfig, MetricsConfig, SchedulerConfig, SettlementConfig,
    StorageBackend, StorageConfig,
};

pub use context::{Clock, ManualClock, MintContext, SystemClock};
pub use error::MintError;

// Re-export peer clients.
pub use client::{ClientError, HttpMintClient, LoopbackNetwork, MintClient, Resource};

// Re-export storage backends.
pub use storage::{
    InMemoryBackend, LedgerRead, LedgerStore, RocksDbBackend, RocksDbConfig, StorageError,
};

pub use tasks::{Scheduler, TaskKind, TaskRecord, TaskStatus, TickReport};

// Re-export metrics registry and the exporter.
pub use metrics::{MetricsRegistry, SettlementMetrics, TaskMetrics, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

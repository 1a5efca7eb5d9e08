//! Metrics and instrumentation for a mint.
//!
//! This module defines Prometheus-compatible metrics for settlement and
//! background propagation, and exposes a small HTTP exporter that serves
//! `/metrics` in Prometheus text format.
//!
//! Typical usage in a mint:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use ledger::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! // Spawn the HTTP exporter in the background:
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! // Elsewhere in the code:
//! registry.settlement.transactions_reserved.inc();
//! ```

pub mod prometheus;

pub use self::prometheus::{
    MetricsRegistry, SettlementMetrics, TaskMetrics, run_prometheus_http_server,
};

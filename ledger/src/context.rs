//! Per-mint execution context.
//!
//! Every entry point of the ledger (settlement operations, propagation
//! receivers, background tasks) takes a [`MintContext`] explicitly. It
//! bundles the identity of the mint, its store, its clock and the client it
//! uses to talk to other mints. Several contexts can live in one process,
//! which is how multi-mint scenarios are simulated in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::client::MintClient;
use crate::config::SettlementConfig;
use crate::metrics::MetricsRegistry;
use crate::storage::LedgerStore;

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// The operating system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Used to drive retry schedules
/// deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Everything a mint operation needs to run.
#[derive(Clone)]
pub struct MintContext {
    /// Host this mint is authoritative for, e.g. `mint.example.com`.
    pub host: String,
    pub store: Arc<LedgerStore>,
    pub clock: Arc<dyn Clock>,
    pub client: Arc<dyn MintClient>,
    pub settlement: SettlementConfig,
    pub metrics: Option<Arc<MetricsRegistry>>,
}

impl MintContext {
    /// A context with the system clock, default settlement limits and no
    /// metrics.
    pub fn new(host: impl Into<String>, store: Arc<LedgerStore>, client: Arc<dyn MintClient>) -> Self {
        Self {
            host: host.into(),
            store,
            clock: Arc::new(SystemClock),
            client,
            settlement: SettlementConfig::default(),
            metrics: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settlement(mut self, settlement: SettlementConfig) -> Self {
        self.settlement = settlement;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Whether `host` designates this mint.
    pub fn is_local(&self, host: &str) -> bool {
        self.host.eq_ignore_ascii_case(host)
    }

    /// Runs `f` against the metrics registry when one is attached.
    pub fn observe(&self, f: impl FnOnce(&MetricsRegistry)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

//! Storage for a mint's ledger.
//!
//! Persistence is split in two layers:
//!
//! - a small key-value abstraction ([`KvBackend`]) with ordered prefix scans
//!   and atomic write batches, implemented by an in-memory map
//!   ([`mem::InMemoryBackend`]) for tests and by RocksDB
//!   ([`rocksdb::RocksDbBackend`]) for persistent mints,
//! - a typed ledger store ([`ledger::LedgerStore`]) on top of it, which
//!   encodes records with bincode, maintains secondary indexes and exposes
//!   all-or-nothing units of work through [`ledger::LedgerStore::atomically`].

use thiserror::Error;

pub mod ledger;
pub mod mem;
pub mod rocksdb;

pub use self::ledger::{LedgerRead, LedgerStore, StoreTxn};
pub use self::mem::InMemoryBackend;
pub use self::rocksdb::{RocksDbBackend, RocksDbConfig};

/// Logical keyspaces. The RocksDB backend maps each one to a column family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Keyspace {
    Assets,
    Offers,
    Transactions,
    Operations,
    Crossings,
    Indexes,
    Tasks,
}

impl Keyspace {
    pub const ALL: [Keyspace; 7] = [
        Keyspace::Assets,
        Keyspace::Offers,
        Keyspace::Transactions,
        Keyspace::Operations,
        Keyspace::Crossings,
        Keyspace::Indexes,
        Keyspace::Tasks,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Keyspace::Assets => "assets",
            Keyspace::Offers => "offers",
            Keyspace::Transactions => "transactions",
            Keyspace::Operations => "operations",
            Keyspace::Crossings => "crossings",
            Keyspace::Indexes => "indexes",
            Keyspace::Tasks => "tasks",
        }
    }
}

/// A single mutation inside a write batch. `value: None` deletes the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOp {
    pub keyspace: Keyspace,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

/// Ordered key-value storage with atomic batches.
///
/// Implementations must apply a batch entirely or not at all, and must
/// return prefix scans in ascending key order.
pub trait KvBackend: Send + Sync {
    fn get(&self, keyspace: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    fn scan_prefix(
        &self,
        keyspace: Keyspace,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), StorageError>;
}

/// Storage-level error type.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] ::rocksdb::Error),

    #[error("missing column family {0}")]
    MissingColumnFamily(&'static str),

    #[error("record encoding failed: {0}")]
    Codec(String),

    /// A uniqueness index already holds a different record.
    #[error("unique index violation: {0}")]
    Conflict(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

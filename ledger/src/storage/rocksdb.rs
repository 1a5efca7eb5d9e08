//! RocksDB-backed key-value backend.
//!
//! Each [`Keyspace`] is stored in a dedicated column family named after it
//! (`"assets"`, `"offers"`, `"transactions"`, ...). Batches are applied with
//! a RocksDB `WriteBatch`, which is atomic.

use std::path::Path;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Deserialize;

use super::{Keyspace, KvBackend, StorageError, WriteOp};

/// Configuration for [`RocksDbBackend`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/mint-db".to_string(),
            create_if_missing: true,
        }
    }
}

/// RocksDB-backed implementation of [`KvBackend`].
pub struct RocksDbBackend {
    db: DB,
}

impl RocksDbBackend {
    /// Opens (or creates) a RocksDB database at the configured path with one
    /// column family per keyspace. The `"default"` column family is also
    /// declared to keep RocksDB happy, but it is not used.
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let mut cfs = vec![ColumnFamilyDescriptor::new("default", Options::default())];
        cfs.extend(
            Keyspace::ALL
                .iter()
                .map(|ks| ColumnFamilyDescriptor::new(ks.name(), Options::default())),
        );

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self { db })
    }

    fn cf(&self, keyspace: Keyspace) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(keyspace.name())
            .ok_or(StorageError::MissingColumnFamily(keyspace.name()))
    }
}

impl KvBackend for RocksDbBackend {
    fn get(&self, keyspace: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(keyspace)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    fn scan_prefix(
        &self,
        keyspace: Keyspace,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let cf = self.cf(keyspace)?;
        let mut out = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        for op in ops {
            let cf = self.cf(op.keyspace)?;
            match op.value {
                Some(value) => batch.put_cf(cf, op.key, value),
                None => batch.delete_cf(cf, op.key),
            }
        }
        self.db.write(batch)?;
        Ok(())
    }
}

//! In-memory key-value backend.
//!
//! This implementation is useful for unit tests and multi-mint simulations.
//! It keeps one ordered `BTreeMap` per keyspace behind a single `RwLock`, so
//! a batch is applied while holding the write lock and readers never observe
//! half of it.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{Keyspace, KvBackend, StorageError, WriteOp};

type Space = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory implementation of [`KvBackend`].
#[derive(Default)]
pub struct InMemoryBackend {
    spaces: RwLock<HashMap<Keyspace, Space>>,
}

impl InMemoryBackend {
    /// Creates a new, empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys stored in `keyspace`.
    pub fn len(&self, keyspace: Keyspace) -> Result<usize, StorageError> {
        let spaces = self.spaces.read().map_err(|_| StorageError::Poisoned)?;
        Ok(spaces.get(&keyspace).map_or(0, BTreeMap::len))
    }
}

impl KvBackend for InMemoryBackend {
    fn get(&self, keyspace: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let spaces = self.spaces.read().map_err(|_| StorageError::Poisoned)?;
        Ok(spaces.get(&keyspace).and_then(|s| s.get(key).cloned()))
    }

    fn scan_prefix(
        &self,
        keyspace: Keyspace,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let spaces = self.spaces.read().map_err(|_| StorageError::Poisoned)?;
        let Some(space) = spaces.get(&keyspace) else {
            return Ok(Vec::new());
        };
        Ok(space
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), StorageError> {
        let mut spaces = self.spaces.write().map_err(|_| StorageError::Poisoned)?;
        for op in ops {
            let space = spaces.entry(op.keyspace).or_default();
            match op.value {
                Some(value) => {
                    space.insert(op.key, value);
                }
                None => {
                    space.remove(&op.key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(keyspace: Keyspace, key: &str, value: &str) -> WriteOp {
        WriteOp {
            keyspace,
            key: key.as_bytes().to_vec(),
            value: Some(value.as_bytes().to_vec()),
        }
    }

    #[test]
    fn batch_put_get_and_delete() {
        let backend = InMemoryBackend::new();
        backend
            .write_batch(vec![
                put(Keyspace::Offers, "a", "1"),
                put(Keyspace::Offers, "b", "2"),
            ])
            .unwrap();

        assert_eq!(
            backend.get(Keyspace::Offers, b"a").unwrap(),
            Some(b"1".to_vec())
        );
        assert_eq!(backend.get(Keyspace::Assets, b"a").unwrap(), None);
        assert_eq!(backend.len(Keyspace::Offers).unwrap(), 2);

        backend
            .write_batch(vec![WriteOp {
                keyspace: Keyspace::Offers,
                key: b"a".to_vec(),
                value: None,
            }])
            .unwrap();
        assert_eq!(backend.get(Keyspace::Offers, b"a").unwrap(), None);
        assert_eq!(backend.len(Keyspace::Offers).unwrap(), 1);
    }

    #[test]
    fn scan_prefix_is_ordered_and_bounded() {
        let backend = InMemoryBackend::new();
        backend
            .write_batch(vec![
                put(Keyspace::Indexes, "ops/t1\0002", "op-b"),
                put(Keyspace::Indexes, "ops/t1\0000", "op-a"),
                put(Keyspace::Indexes, "ops/t10\0000", "other"),
                put(Keyspace::Indexes, "crx/t1\0001", "crossing"),
            ])
            .unwrap();

        let hits = backend.scan_prefix(Keyspace::Indexes, b"ops/t1\0").unwrap();
        let values: Vec<_> = hits.into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![b"op-a".to_vec(), b"op-b".to_vec()]);
    }
}

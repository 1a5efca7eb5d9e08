//! Typed ledger store with atomic units of work.
//!
//! Records are encoded with bincode (serde mode) and stored under their
//! resource id in the matching [`Keyspace`]. Secondary indexes live in the
//! `Indexes` keyspace:
//!
//! - `ops/<transaction>\0<hop>`: operations of a transaction by hop,
//! - `crx/<transaction>\0<hop>`: crossings of a transaction by hop,
//! - `cxo/<offer>\0<transaction>`: the unique crossing of an offer by a
//!   transaction,
//! - `pnd/<deadline>\0<task>`: pending tasks by deadline. Entries are
//!   dropped once a task succeeds or fails, so polling never reads
//!   finished rows.
//!
//! Hops and deadlines are zero-padded so that a prefix scan returns them in
//! order.
//!
//! Every mutation goes through [`LedgerStore::atomically`]: the closure
//! receives a [`StoreTxn`] that buffers writes in an overlay (reads see the
//! buffered writes), and the overlay is committed as one backend batch only
//! if the closure returns `Ok`. Units of work are serialized by a store-wide
//! lock, which makes read-check-write sequences (remainder checks, unique
//! crossings) race free. The closure is synchronous, so the lock can never
//! be held across an await point.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{InMemoryBackend, Keyspace, KvBackend, StorageError, WriteOp};
use crate::tasks::{TaskKind, TaskRecord, TaskStatus};
use crate::types::{Asset, Crossing, Offer, Operation, Transaction, TransactionView};

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| StorageError::Codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    let (value, _): (T, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StorageError::Codec(e.to_string()))?;
    Ok(value)
}

fn hop_index_key(tag: &str, transaction: &str, hop: u32) -> Vec<u8> {
    format!("{tag}/{transaction}\0{hop:010}").into_bytes()
}

fn hop_index_prefix(tag: &str, transaction: &str) -> Vec<u8> {
    format!("{tag}/{transaction}\0").into_bytes()
}

fn crossing_unique_key(offer: &str, transaction: &str) -> Vec<u8> {
    format!("cxo/{offer}\0{transaction}").into_bytes()
}

const PENDING_TASK_PREFIX: &[u8] = b"pnd/";

fn pending_task_key(deadline: u64, task: &str) -> Vec<u8> {
    format!("pnd/{deadline:020}\0{task}").into_bytes()
}

fn pending_deadline(key: &[u8]) -> Option<u64> {
    let start = PENDING_TASK_PREFIX.len();
    let digits = key.get(start..start + 20)?;
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Typed read access shared by the store and by units of work.
///
/// Implementors only provide raw access; every typed accessor is derived.
pub trait LedgerRead {
    fn raw_get(&self, keyspace: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    fn raw_scan(
        &self,
        keyspace: Keyspace,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    fn load<T: DeserializeOwned>(
        &self,
        keyspace: Keyspace,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        self.raw_get(keyspace, key.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Looks up an asset by its fully qualified name.
    fn asset(&self, name: &str) -> Result<Option<Asset>, StorageError> {
        self.load(Keyspace::Assets, name)
    }

    fn offer(&self, id: &str) -> Result<Option<Offer>, StorageError> {
        self.load(Keyspace::Offers, id)
    }

    fn transaction(&self, id: &str) -> Result<Option<Transaction>, StorageError> {
        self.load(Keyspace::Transactions, id)
    }

    fn operation(&self, id: &str) -> Result<Option<Operation>, StorageError> {
        self.load(Keyspace::Operations, id)
    }

    fn crossing(&self, id: &str) -> Result<Option<Crossing>, StorageError> {
        self.load(Keyspace::Crossings, id)
    }

    fn task(&self, id: &str) -> Result<Option<TaskRecord>, StorageError> {
        self.load(Keyspace::Tasks, id)
    }

    /// The crossing recorded for `(offer, transaction)`, if any.
    fn crossing_for(&self, offer: &str, transaction: &str) -> Result<Option<Crossing>, StorageError> {
        match self.raw_get(Keyspace::Indexes, &crossing_unique_key(offer, transaction))? {
            Some(id) => self.crossing(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    /// Operations recorded for a transaction, in hop order.
    fn operations_for(&self, transaction: &str) -> Result<Vec<Operation>, StorageError> {
        let mut out = Vec::new();
        for (_, id) in self.raw_scan(Keyspace::Indexes, &hop_index_prefix("ops", transaction))? {
            if let Some(op) = self.operation(&String::from_utf8_lossy(&id))? {
                out.push(op);
            }
        }
        Ok(out)
    }

    /// Crossings recorded for a transaction, in hop order.
    fn crossings_for(&self, transaction: &str) -> Result<Vec<Crossing>, StorageError> {
        let mut out = Vec::new();
        for (_, id) in self.raw_scan(Keyspace::Indexes, &hop_index_prefix("crx", transaction))? {
            if let Some(crossing) = self.crossing(&String::from_utf8_lossy(&id))? {
                out.push(crossing);
            }
        }
        Ok(out)
    }

    /// A transaction with the operations and crossings recorded here.
    fn transaction_view(&self, id: &str) -> Result<Option<TransactionView>, StorageError> {
        let Some(transaction) = self.transaction(id)? else {
            return Ok(None);
        };
        Ok(Some(TransactionView {
            operations: self.operations_for(id)?,
            crossings: self.crossings_for(id)?,
            transaction,
        }))
    }

    /// Every transaction stored here, canonical or copy, in id order.
    fn transactions(&self) -> Result<Vec<Transaction>, StorageError> {
        self.raw_scan(Keyspace::Transactions, b"")?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    fn tasks(&self) -> Result<Vec<TaskRecord>, StorageError> {
        self.raw_scan(Keyspace::Tasks, b"")?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    /// Pending tasks whose deadline has passed, earliest deadline first.
    fn due_tasks(&self, now_ms: u64) -> Result<Vec<TaskRecord>, StorageError> {
        let mut due = Vec::new();
        for (key, id) in self.raw_scan(Keyspace::Indexes, PENDING_TASK_PREFIX)? {
            match pending_deadline(&key) {
                Some(deadline) if deadline > now_ms => break,
                Some(_) => {}
                None => {
                    return Err(StorageError::Codec(format!(
                        "malformed pending task key {}",
                        String::from_utf8_lossy(&key)
                    )));
                }
            }
            if let Some(task) = self.task(&String::from_utf8_lossy(&id))? {
                if task.status == TaskStatus::Pending {
                    due.push(task);
                }
            }
        }
        Ok(due)
    }
}

/// The typed ledger store of one mint.
pub struct LedgerStore {
    backend: Arc<dyn KvBackend>,
    write_lock: Mutex<()>,
}

impl LedgerStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// A store backed by a fresh [`InMemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// Runs `f` as one all-or-nothing unit of work.
    ///
    /// Writes made through the [`StoreTxn`] become visible to other readers
    /// only once `f` returns `Ok` and the batch is committed. On `Err`
    /// nothing is written and the error is returned unchanged.
    pub fn atomically<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut StoreTxn<'_>) -> Result<R, E>,
        E: From<StorageError>,
    {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut txn = StoreTxn {
            backend: self.backend.as_ref(),
            overlay: BTreeMap::new(),
        };
        let result = f(&mut txn)?;
        let ops = txn
            .overlay
            .into_iter()
            .map(|((keyspace, key), value)| WriteOp { keyspace, key, value })
            .collect::<Vec<_>>();
        if !ops.is_empty() {
            self.backend.write_batch(ops)?;
        }
        Ok(result)
    }
}

impl LedgerRead for LedgerStore {
    fn raw_get(&self, keyspace: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.backend.get(keyspace, key)
    }

    fn raw_scan(
        &self,
        keyspace: Keyspace,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        self.backend.scan_prefix(keyspace, prefix)
    }
}

/// A unit of work in progress. See [`LedgerStore::atomically`].
pub struct StoreTxn<'a> {
    backend: &'a dyn KvBackend,
    overlay: BTreeMap<(Keyspace, Vec<u8>), Option<Vec<u8>>>,
}

impl StoreTxn<'_> {
    fn put<T: Serialize>(&mut self, keyspace: Keyspace, key: &str, value: &T) -> Result<(), StorageError> {
        self.overlay
            .insert((keyspace, key.as_bytes().to_vec()), Some(encode(value)?));
        Ok(())
    }

    fn put_index(&mut self, key: Vec<u8>, id: &str) {
        self.overlay
            .insert((Keyspace::Indexes, key), Some(id.as_bytes().to_vec()));
    }

    fn delete_index(&mut self, key: Vec<u8>) {
        self.overlay.insert((Keyspace::Indexes, key), None);
    }

    pub fn put_asset(&mut self, asset: &Asset) -> Result<(), StorageError> {
        self.put(Keyspace::Assets, &asset.name, asset)
    }

    pub fn put_offer(&mut self, offer: &Offer) -> Result<(), StorageError> {
        self.put(Keyspace::Offers, &offer.id, offer)
    }

    pub fn put_transaction(&mut self, transaction: &Transaction) -> Result<(), StorageError> {
        self.put(Keyspace::Transactions, &transaction.id, transaction)
    }

    /// Stores an operation and indexes it under its transaction hop.
    pub fn put_operation(&mut self, op: &Operation) -> Result<(), StorageError> {
        self.put(Keyspace::Operations, &op.id, op)?;
        self.put_index(hop_index_key("ops", &op.transaction, op.transaction_hop), &op.id);
        Ok(())
    }

    /// Inserts a new crossing, enforcing one crossing per
    /// `(offer, transaction)`.
    pub fn insert_crossing(&mut self, crossing: &Crossing) -> Result<(), StorageError> {
        let unique = crossing_unique_key(&crossing.offer, &crossing.transaction);
        if self.raw_get(Keyspace::Indexes, &unique)?.is_some() {
            return Err(StorageError::Conflict(format!(
                "offer {} already crossed by transaction {}",
                crossing.offer, crossing.transaction
            )));
        }
        self.put(Keyspace::Crossings, &crossing.id, crossing)?;
        self.put_index(unique, &crossing.id);
        self.put_index(
            hop_index_key("crx", &crossing.transaction, crossing.transaction_hop),
            &crossing.id,
        );
        Ok(())
    }

    /// Stores a task and keeps the pending index in step with its status
    /// and deadline.
    pub fn put_task(&mut self, task: &TaskRecord) -> Result<(), StorageError> {
        if let Some(previous) = self.task(&task.id)? {
            if previous.status == TaskStatus::Pending {
                self.delete_index(pending_task_key(previous.deadline, &previous.id));
            }
        }
        self.put(Keyspace::Tasks, &task.id, task)?;
        if task.status == TaskStatus::Pending {
            self.put_index(pending_task_key(task.deadline, &task.id), &task.id);
        }
        Ok(())
    }

    /// Enqueues a task due immediately, committed with the rest of the
    /// unit of work.
    pub fn enqueue(&mut self, kind: TaskKind, subject: &str, now_ms: u64) -> Result<(), StorageError> {
        self.put_task(&TaskRecord::new(kind, subject.to_string(), now_ms))
    }
}

impl LedgerRead for StoreTxn<'_> {
    fn raw_get(&self, keyspace: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        match self.overlay.get(&(keyspace, key.to_vec())) {
            Some(buffered) => Ok(buffered.clone()),
            None => self.backend.get(keyspace, key),
        }
    }

    fn raw_scan(
        &self,
        keyspace: Keyspace,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.backend.scan_prefix(keyspace, prefix)?.into_iter().collect();
        let buffered = self
            .overlay
            .range((keyspace, prefix.to_vec())..)
            .take_while(|((ks, key), _)| *ks == keyspace && key.starts_with(prefix));
        for ((_, key), value) in buffered {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

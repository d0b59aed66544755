// LogStore - Durable, ordered key-value storage for the channel log
//
// The ledger only talks to storage through this trait:
// - get a record by key
// - commit a batch of writes atomically
// - scan every record in key order

use crate::ledger::{LogBatch, LogKey, LogOp, LogValue};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),

    #[error("Corrupt key: {0}")]
    CorruptKey(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl StoreError {
    /// The batch reached the store but may not be durable yet
    pub fn is_after_write(&self) -> bool {
        matches!(self, StoreError::FlushFailed(_))
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of records in the log
    pub key_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// Typed storage backing an HTLC ledger
///
/// `commit` must be all-or-nothing. An error leaves none of the batch's
/// writes visible, except `FlushFailed`, which reports a batch that was
/// fully written but not confirmed durable.
pub trait LogStore {
    /// Read a single record
    fn get(&self, key: &LogKey) -> Result<Option<LogValue>, StoreError>;

    /// Atomically apply a batch of writes
    fn commit(&mut self, batch: &LogBatch) -> Result<(), StoreError>;

    /// All records in key order
    fn scan(&self) -> Result<Vec<(LogKey, LogValue)>, StoreError>;

    /// Write a single record
    fn set(&mut self, key: LogKey, value: LogValue) -> Result<(), StoreError> {
        let mut batch = LogBatch::new();
        batch.put(key, value);
        self.commit(&batch)
    }
}

/// Volatile store for tests and short-lived channels
#[derive(Clone, Debug, Default)]
pub struct MemoryLogStore {
    records: BTreeMap<LogKey, LogValue>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LogStore for MemoryLogStore {
    fn get(&self, key: &LogKey) -> Result<Option<LogValue>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn commit(&mut self, batch: &LogBatch) -> Result<(), StoreError> {
        for op in batch.ops() {
            match op {
                LogOp::Put(key, value) => {
                    self.records.insert(*key, value.clone());
                }
                LogOp::Delete(key) => {
                    self.records.remove(key);
                }
            }
        }
        Ok(())
    }

    fn scan(&self) -> Result<Vec<(LogKey, LogValue)>, StoreError> {
        Ok(self
            .records
            .iter()
            .map(|(key, value)| (*key, value.clone()))
            .collect())
    }
}

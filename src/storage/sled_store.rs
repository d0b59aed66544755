// SledLogStore - Persistent channel log using sled
//
// Keys are encoded so that byte order equals LogKey order:
//   tag (1 byte) | owner (1 byte, Chain/Add/Removal only) | big-endian u64
// Values are postcard-encoded LogValues.

use crate::htlc::{HtlcId, Owner};
use crate::ledger::{LogBatch, LogKey, LogOp, LogValue};
use crate::storage::store::{LogStore, StorageStats, StoreError};
use std::path::{Path, PathBuf};

mod tags {
    pub const CHAIN: u8 = 0x01;
    pub const ADD: u8 = 0x02;
    pub const REMOVAL: u8 = 0x03;
    pub const UNACKED: u8 = 0x04;
}

/// Default tree holding the log of a single channel
pub const DEFAULT_TREE: &str = "htlc_log";

/// Configuration for a sled-backed log
#[derive(Clone, Debug)]
pub struct SledStoreConfig {
    path: PathBuf,
    tree: String,
    flush_on_commit: bool,
    temporary: bool,
}

impl SledStoreConfig {
    /// Defaults: tree `htlc_log`, flush after every commit
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            tree: DEFAULT_TREE.to_string(),
            flush_on_commit: true,
            temporary: false,
        }
    }

    /// Use a named tree, e.g. one per channel in a shared database
    pub fn tree(mut self, tree: impl Into<String>) -> Self {
        self.tree = tree.into();
        self
    }

    /// Whether each commit waits for the data to reach disk
    ///
    /// When off, writes reach disk on [`SledLogStore::flush`] or when the
    /// store is dropped.
    pub fn flush_on_commit(mut self, flush: bool) -> Self {
        self.flush_on_commit = flush;
        self
    }

    /// Remove the database when it is dropped
    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Persistent channel log
///
/// Every commit is a single `apply_batch`, so a batch is either fully
/// written or not at all.
pub struct SledLogStore {
    db: sled::Db,
    tree: sled::Tree,
    flush_on_commit: bool,
}

impl SledLogStore {
    /// Open or create a log at the given path with default settings
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::with_config(SledStoreConfig::new(path))
    }

    /// Open or create a log from an explicit configuration
    pub fn with_config(config: SledStoreConfig) -> Result<Self, StoreError> {
        // No background flusher: it keeps the database locked for a while
        // after the store is dropped, so a quick reopen would fail.
        let db = sled::Config::new()
            .path(&config.path)
            .temporary(config.temporary)
            .flush_every_ms(None)
            .open()
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        let tree = db
            .open_tree(config.tree.as_bytes())
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        tracing::debug!(path = %config.path.display(), tree = %config.tree, "opened htlc log");
        Ok(Self {
            db,
            tree,
            flush_on_commit: config.flush_on_commit,
        })
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.tree
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            key_count: self.tree.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        }
    }
}

impl Drop for SledLogStore {
    fn drop(&mut self) {
        if self.flush_on_commit {
            return;
        }
        if let Err(err) = self.flush() {
            tracing::warn!(%err, "final flush of htlc log failed");
        }
    }
}

impl LogStore for SledLogStore {
    fn get(&self, key: &LogKey) -> Result<Option<LogValue>, StoreError> {
        match self.tree.get(encode_key(key))? {
            Some(bytes) => Ok(Some(decode_value(&bytes)?)),
            None => Ok(None),
        }
    }

    fn commit(&mut self, batch: &LogBatch) -> Result<(), StoreError> {
        let mut sled_batch = sled::Batch::default();
        for op in batch.ops() {
            match op {
                LogOp::Put(key, value) => sled_batch.insert(encode_key(key), encode_value(value)?),
                LogOp::Delete(key) => sled_batch.remove(encode_key(key)),
            }
        }
        self.tree.apply_batch(sled_batch)?;
        if self.flush_on_commit {
            self.flush()?;
        }
        tracing::trace!(ops = batch.len(), "committed log batch");
        Ok(())
    }

    fn scan(&self) -> Result<Vec<(LogKey, LogValue)>, StoreError> {
        let mut records = Vec::with_capacity(self.tree.len());
        for result in self.tree.iter() {
            let (key, value) = result?;
            records.push((decode_key(&key)?, decode_value(&value)?));
        }
        Ok(records)
    }
}

/// Encode a key so that lexicographic byte order matches `LogKey` order
pub fn encode_key(key: &LogKey) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(10);
    match key {
        LogKey::Chain(owner) => {
            bytes.push(tags::CHAIN);
            bytes.push(owner.to_byte());
        }
        LogKey::Add(id) => {
            bytes.push(tags::ADD);
            push_htlc_id(&mut bytes, id);
        }
        LogKey::Removal(id) => {
            bytes.push(tags::REMOVAL);
            push_htlc_id(&mut bytes, id);
        }
        LogKey::Unacked(ctn) => {
            bytes.push(tags::UNACKED);
            bytes.extend_from_slice(&ctn.to_be_bytes());
        }
    }
    bytes
}

fn push_htlc_id(bytes: &mut Vec<u8>, id: &HtlcId) {
    bytes.push(id.proposer.to_byte());
    bytes.extend_from_slice(&id.seq.to_be_bytes());
}

/// Decode a key written by [`encode_key`]
pub fn decode_key(bytes: &[u8]) -> Result<LogKey, StoreError> {
    let corrupt = || StoreError::CorruptKey(hex::encode(bytes));
    let (&tag, rest) = bytes.split_first().ok_or_else(corrupt)?;
    match tag {
        tags::CHAIN => match rest {
            [owner] => Ok(LogKey::Chain(Owner::from_byte(*owner).ok_or_else(corrupt)?)),
            _ => Err(corrupt()),
        },
        tags::ADD | tags::REMOVAL => {
            let (&owner, seq) = rest.split_first().ok_or_else(corrupt)?;
            let proposer = Owner::from_byte(owner).ok_or_else(corrupt)?;
            let seq: [u8; 8] = seq.try_into().map_err(|_| corrupt())?;
            let id = HtlcId::new(proposer, u64::from_be_bytes(seq));
            if tag == tags::ADD {
                Ok(LogKey::Add(id))
            } else {
                Ok(LogKey::Removal(id))
            }
        }
        tags::UNACKED => {
            let ctn: [u8; 8] = rest.try_into().map_err(|_| corrupt())?;
            Ok(LogKey::Unacked(u64::from_be_bytes(ctn)))
        }
        _ => Err(corrupt()),
    }
}

fn encode_value(value: &LogValue) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(value).map_err(|e| StoreError::SerializationFailed(e.to_string()))
}

fn decode_value(bytes: &[u8]) -> Result<LogValue, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
}

// Channel log - typed records and their in-memory projection
//
// The store holds one record per key:
// - Chain(owner)    -> commitment window and next HTLC id of that owner
// - Add(id)         -> the HTLC and where it is locked in on each chain
// - Removal(id)     -> settle/fail and where it is locked in on each chain
// - Unacked(ctn)    -> raw outbound messages awaiting acknowledgment

use crate::htlc::{Htlc, HtlcId, Outcome, Owner};
use crate::storage::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-owner optional commitment numbers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtnPair {
    pub local: Option<u64>,
    pub remote: Option<u64>,
}

impl CtnPair {
    /// Only pending on one owner's chain so far
    pub fn pending_on(owner: Owner, ctn: u64) -> Self {
        let mut pair = Self::default();
        pair.set(owner, ctn);
        pair
    }

    pub fn get(&self, owner: Owner) -> Option<u64> {
        match owner {
            Owner::Local => self.local,
            Owner::Remote => self.remote,
        }
    }

    pub fn set(&mut self, owner: Owner, ctn: u64) {
        match owner {
            Owner::Local => self.local = Some(ctn),
            Owner::Remote => self.remote = Some(ctn),
        }
    }

    /// Whether the event is part of `owner`'s chain at `ctn`
    pub fn is_in(&self, owner: Owner, ctn: u64) -> bool {
        matches!(self.get(owner), Some(at) if at <= ctn)
    }
}

/// Log entry for an HTLC add
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEntry {
    pub htlc: Htlc,
    pub locked_in: CtnPair,
}

/// Log entry for an HTLC settle or fail
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalEntry {
    pub outcome: Outcome,
    pub ctns: CtnPair,
}

/// Oldest unrevoked and latest signed commitment numbers of one owner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtnWindow {
    pub oldest_unrevoked: u64,
    pub latest: u64,
}

/// Per-owner chain bookkeeping
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    /// None until the channel open handshake completed
    pub window: Option<CtnWindow>,
    pub next_htlc_id: u64,
}

/// Structured key of a log record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogKey {
    Chain(Owner),
    Add(HtlcId),
    Removal(HtlcId),
    Unacked(u64),
}

/// Value stored under a [`LogKey`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogValue {
    Chain(ChainState),
    Add(AddEntry),
    Removal(RemovalEntry),
    Unacked(Vec<Vec<u8>>),
}

impl LogValue {
    /// Short name of the record kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            LogValue::Chain(_) => "chain",
            LogValue::Add(_) => "add",
            LogValue::Removal(_) => "removal",
            LogValue::Unacked(_) => "unacked",
        }
    }
}

/// A single write in a batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogOp {
    Put(LogKey, LogValue),
    Delete(LogKey),
}

/// Writes that must reach the store all together or not at all
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogBatch {
    ops: Vec<LogOp>,
}

impl LogBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: LogKey, value: LogValue) {
        self.ops.push(LogOp::Put(key, value));
    }

    pub fn delete(&mut self, key: LogKey) {
        self.ops.push(LogOp::Delete(key));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[LogOp] {
        &self.ops
    }
}

/// In-memory view of every record in the store
#[derive(Clone, Debug, Default)]
pub struct ChannelLog {
    local: ChainState,
    remote: ChainState,
    adds: BTreeMap<HtlcId, AddEntry>,
    removals: BTreeMap<HtlcId, RemovalEntry>,
    unacked: BTreeMap<u64, Vec<Vec<u8>>>,
}

impl ChannelLog {
    /// Rebuild from stored records
    ///
    /// Fails on the first record whose value kind does not match its key.
    pub fn from_records<I>(records: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (LogKey, LogValue)>,
    {
        let mut log = Self::default();
        for (key, value) in records {
            log.put(key, value)?;
        }
        Ok(log)
    }

    pub fn chain(&self, owner: Owner) -> &ChainState {
        match owner {
            Owner::Local => &self.local,
            Owner::Remote => &self.remote,
        }
    }

    pub fn add(&self, id: &HtlcId) -> Option<&AddEntry> {
        self.adds.get(id)
    }

    pub fn removal(&self, id: &HtlcId) -> Option<&RemovalEntry> {
        self.removals.get(id)
    }

    /// Adds proposed by `proposer`, in sequence order
    pub fn adds_by(&self, proposer: Owner) -> impl Iterator<Item = (&HtlcId, &AddEntry)> {
        self.adds
            .range(HtlcId::new(proposer, 0)..=HtlcId::new(proposer, u64::MAX))
    }

    /// Removals of HTLCs proposed by `proposer`, in sequence order
    pub fn removals_by(&self, proposer: Owner) -> impl Iterator<Item = (&HtlcId, &RemovalEntry)> {
        self.removals
            .range(HtlcId::new(proposer, 0)..=HtlcId::new(proposer, u64::MAX))
    }

    pub fn adds(&self) -> impl Iterator<Item = (&HtlcId, &AddEntry)> {
        self.adds.iter()
    }

    pub fn unacked(&self) -> &BTreeMap<u64, Vec<Vec<u8>>> {
        &self.unacked
    }

    /// Apply a batch that the store already accepted
    pub fn apply(&mut self, batch: &LogBatch) {
        for op in batch.ops() {
            match op {
                LogOp::Put(key, value) => {
                    if let Err(err) = self.put(*key, value.clone()) {
                        tracing::error!(%err, "skipping malformed batch record");
                    }
                }
                LogOp::Delete(key) => self.delete(key),
            }
        }
    }

    fn put(&mut self, key: LogKey, value: LogValue) -> Result<(), StoreError> {
        match (key, value) {
            (LogKey::Chain(Owner::Local), LogValue::Chain(state)) => self.local = state,
            (LogKey::Chain(Owner::Remote), LogValue::Chain(state)) => self.remote = state,
            (LogKey::Add(id), LogValue::Add(entry)) => {
                self.adds.insert(id, entry);
            }
            (LogKey::Removal(id), LogValue::Removal(entry)) => {
                self.removals.insert(id, entry);
            }
            (LogKey::Unacked(ctn), LogValue::Unacked(msgs)) => {
                self.unacked.insert(ctn, msgs);
            }
            (key, value) => {
                return Err(StoreError::CorruptRecord(format!(
                    "{key:?} holds a {} record",
                    value.kind()
                )));
            }
        }
        Ok(())
    }

    fn delete(&mut self, key: &LogKey) {
        match key {
            LogKey::Chain(Owner::Local) => self.local = ChainState::default(),
            LogKey::Chain(Owner::Remote) => self.remote = ChainState::default(),
            LogKey::Add(id) => {
                self.adds.remove(id);
            }
            LogKey::Removal(id) => {
                self.removals.remove(id);
            }
            LogKey::Unacked(ctn) => {
                self.unacked.remove(ctn);
            }
        }
    }
}

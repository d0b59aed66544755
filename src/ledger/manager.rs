// HTLC Manager - Tracks which HTLCs are in which commitment transaction
//
// Each side of a channel runs one manager. It records adds and removals
// against two commitment chains (ours and theirs) that advance at their
// own pace, and answers which HTLCs are in the oldest unrevoked, the
// latest signed and the next commitment of either chain.
//
// Every mutation is built as a LogBatch, committed to the store and only
// then applied to memory, so a failed call changes nothing.

use crate::htlc::{Direction, Htlc, HtlcId, HtlcTerms, Outcome, Owner};
use crate::ledger::channel_log::{
    AddEntry, ChannelLog, CtnPair, CtnWindow, LogBatch, LogKey, LogValue, RemovalEntry,
};
use crate::storage::{LogStore, MemoryLogStore, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors that can occur while driving the ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Channel not open: commitment numbers are not initialized")]
    Uninitialized,

    #[error("Channel already open")]
    AlreadyOpen,

    #[error("Unexpected {proposer} htlc id: next should be {expected} but got {got}")]
    UnexpectedHtlcId { proposer: Owner, expected: u64, got: u64 },

    #[error("Unknown htlc {0}")]
    UnknownHtlc(HtlcId),

    #[error("Htlc {0} already resolved")]
    AlreadyResolved(HtlcId),

    #[error("Htlc {id} is not in the {ctx_owner} commitment at ctn {ctn}")]
    NotActive { id: HtlcId, ctx_owner: Owner, ctn: u64 },

    #[error("No unrevoked {0} commitment left to revoke")]
    NothingToRevoke(Owner),

    #[error("Ledger poisoned by an unconfirmed store write; reopen it from the store")]
    Poisoned,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Protocol ordering violations, as opposed to state or storage failures
    pub fn is_sequencing(&self) -> bool {
        matches!(
            self,
            LedgerError::UnexpectedHtlcId { .. }
                | LedgerError::UnknownHtlc(_)
                | LedgerError::AlreadyResolved(_)
                | LedgerError::NotActive { .. }
                | LedgerError::NothingToRevoke(_)
        )
    }
}

/// Updates dropped by [`HtlcManager::discard_unsigned_remote_updates`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscardedUpdates {
    pub adds: Vec<HtlcId>,
    pub removals: Vec<HtlcId>,
}

/// The channel ledger
pub struct HtlcManager<S = MemoryLogStore> {
    store: S,
    log: ChannelLog,
    /// HTLCs that may still be in an unrevoked commitment of either owner.
    /// Rebuilt on load, never persisted.
    maybe_active: BTreeSet<HtlcId>,
    /// Set when the store may hold a batch that `log` never applied
    poisoned: bool,
}

impl HtlcManager<MemoryLogStore> {
    /// A fresh ledger kept in memory only
    pub fn new() -> Self {
        Self {
            store: MemoryLogStore::new(),
            log: ChannelLog::default(),
            maybe_active: BTreeSet::new(),
            poisoned: false,
        }
    }
}

impl Default for HtlcManager<MemoryLogStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: LogStore> HtlcManager<S> {
    /// Load the ledger from a store; an empty store gives an unopened channel
    pub fn open(store: S) -> Result<Self, LedgerError> {
        let log = ChannelLog::from_records(store.scan()?)?;
        let mut manager = Self {
            store,
            log,
            maybe_active: BTreeSet::new(),
            poisoned: false,
        };
        manager.maybe_active = manager.log.adds().map(|(id, _)| *id).collect();
        manager.prune_maybe_active();
        tracing::debug!(
            adds = manager.log.adds().count(),
            active = manager.maybe_active.len(),
            "loaded htlc ledger"
        );
        Ok(manager)
    }

    /// Get the backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether a store write went unconfirmed; all further mutations fail
    /// until the ledger is reopened from its store
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Give up the ledger and return its store
    pub fn into_store(self) -> S {
        self.store
    }

    // ========================================================================
    // COMMITMENT NUMBERS
    // ========================================================================

    fn window(&self, owner: Owner) -> Result<CtnWindow, LedgerError> {
        self.log.chain(owner).window.ok_or(LedgerError::Uninitialized)
    }

    /// Whether `open_finished` has been called
    pub fn is_open(&self) -> bool {
        self.log.chain(Owner::Local).window.is_some()
            && self.log.chain(Owner::Remote).window.is_some()
    }

    /// Number of the newest commitment of `owner` that has a valid signature
    pub fn ctn_latest(&self, owner: Owner) -> Result<u64, LedgerError> {
        Ok(self.window(owner)?.latest)
    }

    /// Number of the oldest commitment of `owner` that is not revoked yet
    pub fn ctn_oldest_unrevoked(&self, owner: Owner) -> Result<u64, LedgerError> {
        Ok(self.window(owner)?.oldest_unrevoked)
    }

    /// Whether `owner` got a new commitment but has not revoked the previous one
    pub fn is_revack_pending(&self, owner: Owner) -> Result<bool, LedgerError> {
        let window = self.window(owner)?;
        Ok(window.latest > window.oldest_unrevoked)
    }

    /// Sequence number the next HTLC proposed by `owner` must carry
    pub fn next_htlc_id(&self, owner: Owner) -> u64 {
        self.log.chain(owner).next_htlc_id
    }

    // ========================================================================
    // ACTIONS ON THE CHANNEL
    // ========================================================================

    /// Initialize both commitment chains once the funding handshake completed
    pub fn open_finished(&mut self) -> Result<(), LedgerError> {
        if self.is_open() {
            tracing::warn!("channel open finished twice");
            return Err(LedgerError::AlreadyOpen);
        }
        let mut batch = LogBatch::new();
        for owner in [Owner::Local, Owner::Remote] {
            let mut chain = *self.log.chain(owner);
            chain.window = Some(CtnWindow {
                oldest_unrevoked: 0,
                latest: 0,
            });
            batch.put(LogKey::Chain(owner), LogValue::Chain(chain));
        }
        self.commit(&batch)?;
        tracing::debug!("channel open finished");
        Ok(())
    }

    /// Offer a new HTLC to the counterparty
    ///
    /// Allocates the next local sequence number. The add is pending on the
    /// remote chain right away.
    pub fn originate(&mut self, terms: HtlcTerms) -> Result<Htlc, LedgerError> {
        let htlc = Htlc::new(self.next_htlc_id(Owner::Local), terms);
        self.add_htlc(Owner::Local, htlc.clone())?;
        Ok(htlc)
    }

    /// Record an HTLC offered by the counterparty
    pub fn receive(&mut self, htlc: Htlc) -> Result<HtlcId, LedgerError> {
        self.add_htlc(Owner::Remote, htlc)
    }

    fn add_htlc(&mut self, proposer: Owner, htlc: Htlc) -> Result<HtlcId, LedgerError> {
        // the add first lands in the commitment of the side that did not propose it
        let ctx_owner = proposer.inverted();
        let window = self.window(ctx_owner)?;
        let mut chain = *self.log.chain(proposer);
        if htlc.id() != chain.next_htlc_id {
            tracing::warn!(
                %proposer,
                expected = chain.next_htlc_id,
                got = htlc.id(),
                "out of order htlc id"
            );
            return Err(LedgerError::UnexpectedHtlcId {
                proposer,
                expected: chain.next_htlc_id,
                got: htlc.id(),
            });
        }

        let id = HtlcId::new(proposer, htlc.id());
        let ctn = window.latest + 1;
        chain.next_htlc_id += 1;

        let mut batch = LogBatch::new();
        batch.put(
            LogKey::Add(id),
            LogValue::Add(AddEntry {
                htlc,
                locked_in: CtnPair::pending_on(ctx_owner, ctn),
            }),
        );
        batch.put(LogKey::Chain(proposer), LogValue::Chain(chain));
        self.commit(&batch)?;
        self.maybe_active.insert(id);

        tracing::debug!(%id, %ctx_owner, ctn, "htlc added");
        Ok(id)
    }

    /// Settle or fail an HTLC
    ///
    /// For an HTLC the counterparty offered this is our own settle/fail;
    /// for one we offered it records the counterparty's. Either way the
    /// removal is pending on the proposer's chain first.
    pub fn resolve(&mut self, id: HtlcId, outcome: Outcome) -> Result<(), LedgerError> {
        let ctx_owner = id.proposer;
        let window = self.window(ctx_owner)?;
        if self.log.add(&id).is_none() {
            tracing::warn!(%id, "resolving unknown htlc");
            return Err(LedgerError::UnknownHtlc(id));
        }
        if self.log.removal(&id).is_some() {
            tracing::warn!(%id, "resolving htlc twice");
            return Err(LedgerError::AlreadyResolved(id));
        }
        let ctn = window.latest + 1;
        if !self.is_htlc_active_at_ctn(ctx_owner, ctn, id) {
            tracing::warn!(%id, %ctx_owner, ctn, "resolving htlc that is not committed");
            return Err(LedgerError::NotActive { id, ctx_owner, ctn });
        }

        let mut batch = LogBatch::new();
        batch.put(
            LogKey::Removal(id),
            LogValue::Removal(RemovalEntry {
                outcome,
                ctns: CtnPair::pending_on(ctx_owner, ctn),
            }),
        );
        self.commit(&batch)?;

        tracing::debug!(%id, ?outcome, %ctx_owner, ctn, "htlc resolved");
        Ok(())
    }

    /// We signed a new commitment transaction for the counterparty
    pub fn send_commitment(&mut self) -> Result<u64, LedgerError> {
        self.advance_latest(Owner::Remote)
    }

    /// The counterparty signed a new commitment transaction for us
    pub fn receive_commitment(&mut self) -> Result<u64, LedgerError> {
        self.advance_latest(Owner::Local)
    }

    fn advance_latest(&mut self, owner: Owner) -> Result<u64, LedgerError> {
        let mut chain = *self.log.chain(owner);
        let mut window = chain.window.ok_or(LedgerError::Uninitialized)?;
        window.latest += 1;
        chain.window = Some(window);

        let mut batch = LogBatch::new();
        batch.put(LogKey::Chain(owner), LogValue::Chain(chain));
        self.commit(&batch)?;

        tracing::debug!(%owner, ctn = window.latest, "commitment signed");
        Ok(window.latest)
    }

    /// We revoked our oldest unrevoked commitment
    pub fn send_revocation(&mut self) -> Result<(), LedgerError> {
        self.revoke(Owner::Local)
    }

    /// The counterparty revoked its oldest unrevoked commitment
    ///
    /// Also drops the replay buckets the counterparty just acknowledged.
    pub fn receive_revocation(&mut self) -> Result<(), LedgerError> {
        self.revoke(Owner::Remote)
    }

    fn revoke(&mut self, owner: Owner) -> Result<(), LedgerError> {
        let other = owner.inverted();
        let mut chain = *self.log.chain(owner);
        let mut window = chain.window.ok_or(LedgerError::Uninitialized)?;
        if window.oldest_unrevoked >= window.latest {
            tracing::warn!(%owner, ctn = window.latest, "revocation without newer commitment");
            return Err(LedgerError::NothingToRevoke(owner));
        }
        window.oldest_unrevoked += 1;
        chain.window = Some(window);
        let revoked_up_to = window.oldest_unrevoked;
        let other_next = self.window(other)?.latest + 1;

        let mut batch = LogBatch::new();
        batch.put(LogKey::Chain(owner), LogValue::Chain(chain));

        // Updates now irrevocably in `owner`'s chain move on to the other chain:
        // adds the other side proposed and removals of HTLCs `owner` proposed.
        for id in self.maybe_active.iter().filter(|id| id.proposer == other) {
            let Some(entry) = self.log.add(id) else { continue };
            if entry.locked_in.get(other).is_none() && entry.locked_in.is_in(owner, revoked_up_to) {
                let mut entry = entry.clone();
                entry.locked_in.set(other, other_next);
                batch.put(LogKey::Add(*id), LogValue::Add(entry));
            }
        }
        for id in self.maybe_active.iter().filter(|id| id.proposer == owner) {
            let Some(entry) = self.log.removal(id) else { continue };
            if entry.ctns.get(other).is_none() && entry.ctns.is_in(owner, revoked_up_to) {
                let mut entry = entry.clone();
                entry.ctns.set(other, other_next);
                batch.put(LogKey::Removal(*id), LogValue::Removal(entry));
            }
        }

        if owner == Owner::Remote {
            for ctn in self.log.unacked().range(..=revoked_up_to).map(|(ctn, _)| *ctn) {
                batch.delete(LogKey::Unacked(ctn));
            }
        }

        self.commit(&batch)?;
        self.prune_maybe_active();

        tracing::debug!(
            %owner,
            oldest_unrevoked = revoked_up_to,
            updates = batch.len() - 1,
            "commitment revoked"
        );
        Ok(())
    }

    /// Forget updates the counterparty sent but never signed
    ///
    /// Used on reconnect: the peer will resend them if it still wants them.
    pub fn discard_unsigned_remote_updates(&mut self) -> Result<DiscardedUpdates, LedgerError> {
        let latest = self.window(Owner::Local)?.latest;
        let unsigned = |ctns: &CtnPair| matches!(ctns.local, Some(ctn) if ctn > latest);

        let mut discarded = DiscardedUpdates::default();
        let mut next_remote_id = 0;
        for (id, entry) in self.log.adds_by(Owner::Remote) {
            if unsigned(&entry.locked_in) {
                discarded.adds.push(*id);
            } else {
                next_remote_id = id.seq + 1;
            }
        }
        for (id, entry) in self.log.removals_by(Owner::Local) {
            if unsigned(&entry.ctns) {
                discarded.removals.push(*id);
            }
        }

        let mut chain = *self.log.chain(Owner::Remote);
        chain.next_htlc_id = next_remote_id;

        let mut batch = LogBatch::new();
        for id in &discarded.adds {
            batch.delete(LogKey::Add(*id));
        }
        for id in &discarded.removals {
            batch.delete(LogKey::Removal(*id));
        }
        batch.put(LogKey::Chain(Owner::Remote), LogValue::Chain(chain));
        self.commit(&batch)?;
        for id in &discarded.adds {
            self.maybe_active.remove(id);
        }

        if !discarded.adds.is_empty() || !discarded.removals.is_empty() {
            tracing::debug!(
                adds = discarded.adds.len(),
                removals = discarded.removals.len(),
                "discarded unsigned remote updates"
            );
        }
        Ok(discarded)
    }

    // ========================================================================
    // REPLAY OF UNACKED LOCAL UPDATES
    // ========================================================================

    /// Keep a raw outbound message until the counterparty acknowledges it
    ///
    /// Update messages go into the bucket of the remote commitment they will
    /// be signed into; a commitment signature closes the bucket of the
    /// commitment it created.
    pub fn record_outbound_raw(
        &mut self,
        payload: Vec<u8>,
        is_commitment_signature: bool,
    ) -> Result<(), LedgerError> {
        let latest = self.window(Owner::Remote)?.latest;
        let ctn = if is_commitment_signature {
            latest
        } else {
            latest + 1
        };

        let mut msgs = self.log.unacked().get(&ctn).cloned().unwrap_or_default();
        msgs.push(payload);

        let mut batch = LogBatch::new();
        batch.put(LogKey::Unacked(ctn), LogValue::Unacked(msgs));
        self.commit(&batch)?;

        tracing::trace!(ctn, is_commitment_signature, "stored outbound message");
        Ok(())
    }

    /// Messages to resend after a reconnect, by remote ctn, in send order
    pub fn unacked_updates(&self) -> &BTreeMap<u64, Vec<Vec<u8>>> {
        self.log.unacked()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Get an HTLC by id, resolved or not
    pub fn htlc_by_id(&self, id: HtlcId) -> Option<&Htlc> {
        self.log.add(&id).map(|entry| &entry.htlc)
    }

    /// Whether the HTLC is in `ctx_owner`'s commitment number `ctn`
    pub fn is_htlc_active_at_ctn(&self, ctx_owner: Owner, ctn: u64, id: HtlcId) -> bool {
        let Some(add) = self.log.add(&id) else {
            return false;
        };
        if !add.locked_in.is_in(ctx_owner, ctn) {
            return false;
        }
        match self.log.removal(&id) {
            Some(removal) => !removal.ctns.is_in(ctx_owner, ctn),
            None => true,
        }
    }

    /// HTLCs in `subject`'s commitment `ctn` with the given direction, by id
    ///
    /// Direction is relative to `subject`.
    pub fn htlcs_by_direction(
        &self,
        subject: Owner,
        direction: Direction,
        ctn: u64,
    ) -> BTreeMap<u64, Htlc> {
        let proposer = direction.proposer_for(subject);
        let recent = matches!(self.log.chain(subject).window, Some(w) if ctn >= w.oldest_unrevoked);
        let candidates: Vec<HtlcId> = if recent {
            self.maybe_active
                .iter()
                .filter(|id| id.proposer == proposer)
                .copied()
                .collect()
        } else {
            // too old for the index, walk the whole log
            self.log.adds_by(proposer).map(|(id, _)| *id).collect()
        };

        candidates
            .into_iter()
            .filter(|id| self.is_htlc_active_at_ctn(subject, ctn, *id))
            .filter_map(|id| self.htlc_by_id(id).map(|htlc| (id.seq, htlc.clone())))
            .collect()
    }

    /// HTLCs in `subject`'s commitment `ctn`: sent first, then received
    pub fn htlcs(&self, subject: Owner, ctn: u64) -> Vec<(Direction, Htlc)> {
        [Direction::Sent, Direction::Received]
            .into_iter()
            .flat_map(|direction| {
                self.htlcs_by_direction(subject, direction, ctn)
                    .into_values()
                    .map(move |htlc| (direction, htlc))
            })
            .collect()
    }

    /// HTLCs in the oldest commitment of `subject` that is not revoked yet
    pub fn htlcs_in_oldest_unrevoked(
        &self,
        subject: Owner,
    ) -> Result<Vec<(Direction, Htlc)>, LedgerError> {
        Ok(self.htlcs(subject, self.ctn_oldest_unrevoked(subject)?))
    }

    /// HTLCs in the newest signed commitment of `subject`
    pub fn htlcs_in_latest(&self, subject: Owner) -> Result<Vec<(Direction, Htlc)>, LedgerError> {
        Ok(self.htlcs(subject, self.ctn_latest(subject)?))
    }

    /// HTLCs that would be in a commitment for `subject` signed right now
    pub fn htlcs_in_next(&self, subject: Owner) -> Result<Vec<(Direction, Htlc)>, LedgerError> {
        Ok(self.htlcs(subject, self.ctn_latest(subject)? + 1))
    }

    /// Every HTLC ever added: ours as sent, theirs as received
    pub fn all_htlcs_ever(&self) -> Vec<(Direction, Htlc)> {
        self.log
            .adds()
            .map(|(id, entry)| {
                let direction = Direction::relative_to(Owner::Local, id.proposer);
                (direction, entry.htlc.clone())
            })
            .collect()
    }

    /// HTLCs settled in `subject`'s chain up to and including `ctn`
    pub fn settled_by_direction(
        &self,
        subject: Owner,
        direction: Direction,
        ctn: u64,
    ) -> Vec<Htlc> {
        self.log
            .removals_by(direction.proposer_for(subject))
            .filter(|(_, removal)| {
                removal.outcome == Outcome::Settled && removal.ctns.is_in(subject, ctn)
            })
            .filter_map(|(id, _)| self.htlc_by_id(*id).cloned())
            .collect()
    }

    /// HTLCs settled in `subject`'s chain up to `ctn`: sent first, then received
    pub fn all_settled_ever_at(&self, subject: Owner, ctn: u64) -> Vec<(Direction, Htlc)> {
        [Direction::Sent, Direction::Received]
            .into_iter()
            .flat_map(|direction| {
                self.settled_by_direction(subject, direction, ctn)
                    .into_iter()
                    .map(move |htlc| (direction, htlc))
            })
            .collect()
    }

    /// HTLCs settled in `subject`'s oldest unrevoked commitment or before
    pub fn all_settled_ever(&self, subject: Owner) -> Result<Vec<(Direction, Htlc)>, LedgerError> {
        Ok(self.all_settled_ever_at(subject, self.ctn_oldest_unrevoked(subject)?))
    }

    fn removed_exactly_at(
        &self,
        ctn: u64,
        ctx_owner: Owner,
        proposer: Owner,
        outcome: Outcome,
    ) -> Vec<Htlc> {
        self.log
            .removals_by(proposer)
            .filter(|(_, removal)| {
                removal.outcome == outcome && removal.ctns.get(ctx_owner) == Some(ctn)
            })
            .filter_map(|(id, _)| self.htlc_by_id(*id).cloned())
            .collect()
    }

    /// Our HTLCs whose settlement entered the remote chain at `remote_ctn`
    pub fn sent_in_ctn(&self, remote_ctn: u64) -> Vec<Htlc> {
        self.removed_exactly_at(remote_ctn, Owner::Remote, Owner::Local, Outcome::Settled)
    }

    /// Their HTLCs whose settlement entered our chain at `local_ctn`
    pub fn received_in_ctn(&self, local_ctn: u64) -> Vec<Htlc> {
        self.removed_exactly_at(local_ctn, Owner::Local, Owner::Remote, Outcome::Settled)
    }

    /// Our HTLCs whose failure entered the remote chain at `remote_ctn`
    pub fn failed_in_ctn(&self, remote_ctn: u64) -> Vec<Htlc> {
        self.removed_exactly_at(remote_ctn, Owner::Remote, Owner::Local, Outcome::Failed)
    }

    /// Whether the add is in the oldest unrevoked commitment of `ctx_owner`,
    /// or of both owners when `ctx_owner` is None
    pub fn is_htlc_irrevocably_added_yet(
        &self,
        ctx_owner: Option<Owner>,
        id: HtlcId,
    ) -> Result<bool, LedgerError> {
        let added = |owner: Owner| -> Result<bool, LedgerError> {
            let oldest = self.ctn_oldest_unrevoked(owner)?;
            Ok(self
                .log
                .add(&id)
                .is_some_and(|entry| entry.locked_in.is_in(owner, oldest)))
        };
        match ctx_owner {
            Some(owner) => added(owner),
            None => Ok(added(Owner::Local)? && added(Owner::Remote)?),
        }
    }

    /// Whether the removal is in the oldest unrevoked commitment of
    /// `ctx_owner`, or of both owners when `ctx_owner` is None
    pub fn is_htlc_irrevocably_removed_yet(
        &self,
        ctx_owner: Option<Owner>,
        id: HtlcId,
    ) -> Result<bool, LedgerError> {
        let removed = |owner: Owner| -> Result<bool, LedgerError> {
            let oldest = self.ctn_oldest_unrevoked(owner)?;
            Ok(self
                .log
                .removal(&id)
                .is_some_and(|entry| entry.ctns.is_in(owner, oldest)))
        };
        match ctx_owner {
            Some(owner) => removed(owner),
            None => Ok(removed(Owner::Local)? && removed(Owner::Remote)?),
        }
    }

    /// Whether the preimage of this HTLC was (or is about to be) revealed
    pub fn was_htlc_preimage_released(&self, id: HtlcId) -> bool {
        self.was_removed_as(id, Outcome::Settled)
    }

    /// Whether this HTLC was (or is about to be) failed
    pub fn was_htlc_failed(&self, id: HtlcId) -> bool {
        self.was_removed_as(id, Outcome::Failed)
    }

    fn was_removed_as(&self, id: HtlcId, outcome: Outcome) -> bool {
        self.log
            .removal(&id)
            .is_some_and(|entry| entry.outcome == outcome && entry.ctns.get(id.proposer).is_some())
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn commit(&mut self, batch: &LogBatch) -> Result<(), LedgerError> {
        if self.poisoned {
            return Err(LedgerError::Poisoned);
        }
        if let Err(err) = self.store.commit(batch) {
            if err.is_after_write() {
                // memory is now one batch behind the store
                self.poisoned = true;
                tracing::error!(
                    %err,
                    ops = batch.len(),
                    "store write unconfirmed, ledger poisoned"
                );
            }
            return Err(err.into());
        }
        self.log.apply(batch);
        Ok(())
    }

    /// Drop HTLCs whose removal is irrevocable on both chains, keeping one
    /// commitment of margin.
    fn prune_maybe_active(&mut self) {
        let (Some(local), Some(remote)) = (
            self.log.chain(Owner::Local).window,
            self.log.chain(Owner::Remote).window,
        ) else {
            return;
        };
        let log = &self.log;
        self.maybe_active.retain(|id| {
            let Some(removal) = log.removal(id) else { return true };
            let gone = |ctn: Option<u64>, window: CtnWindow| {
                matches!(ctn, Some(ctn) if ctn < window.oldest_unrevoked)
            };
            let gone_local = gone(removal.ctns.local, local);
            let gone_remote = gone(removal.ctns.remote, remote);
            !(gone_local && gone_remote)
        });
    }

    #[cfg(test)]
    pub(crate) fn maybe_active_len(&self) -> usize {
        self.maybe_active.len()
    }

    #[cfg(test)]
    pub(crate) fn chain_state(&self, owner: Owner) -> crate::ledger::channel_log::ChainState {
        *self.log.chain(owner)
    }

    #[cfg(test)]
    pub(crate) fn add_entry(&self, id: HtlcId) -> Option<&AddEntry> {
        self.log.add(&id)
    }
}

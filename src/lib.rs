// htlc-ledger - HTLC and commitment log state machine for two-party payment channels
//
// - htlc: owners, directions, identifiers and HTLC terms
// - ledger: the channel log and the manager driving it
// - storage: durable, ordered storage for the log

pub mod htlc;
pub mod ledger;
pub mod storage;

pub use htlc::{Direction, Htlc, HtlcId, HtlcTerms, Outcome, Owner, PaymentHash};
pub use ledger::{HtlcManager, LedgerError};
pub use storage::{LogStore, MemoryLogStore, SledLogStore, StoreError};

// Ledger module - THE CHANNEL LOG
// Tracks HTLC adds and removals against both commitment chains

mod channel_log;
mod manager;

pub use channel_log::{
    AddEntry, ChainState, ChannelLog, CtnPair, CtnWindow, LogBatch, LogKey, LogOp, LogValue,
    RemovalEntry,
};
pub use manager::{DiscardedUpdates, HtlcManager, LedgerError};

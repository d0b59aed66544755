// Storage module - PERSISTENCE
// Typed key-value storage for the channel log, in memory or on disk via sled

mod sled_store;
mod store;

pub use sled_store::{decode_key, encode_key, SledLogStore, SledStoreConfig, DEFAULT_TREE};
pub use store::{LogStore, MemoryLogStore, StorageStats, StoreError};

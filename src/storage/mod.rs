//! Persistent storage for ledger entries.
//!
//! Two layers:
//! - [`StorageBackend`]: a raw string key-value medium (memory or files)
//! - [`PersistentStore`]: typed load/save of entries, implemented for any
//!   backend by [`StorageAdapter`]

mod adapter;
mod backend;
mod file;

pub use adapter::{parse_entries, PersistentStore, StorageAdapter};
pub use backend::{MemoryBackend, StorageBackend};
pub use file::{FileBackend, FileBackendConfig};

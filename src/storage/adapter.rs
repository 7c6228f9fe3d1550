//! Typed load/save of ledger entries over a raw storage medium.

use crate::error::{Result, StoreError};
use crate::storage::backend::StorageBackend;
use crate::types::LineItem;
use std::collections::HashSet;

/// Durable home of a ledger's entries.
///
/// `load` returns `Ok(None)` both when nothing is stored and when the stored
/// value is not a valid entry sequence. The only error either method reports
/// is the medium being out of reach.
pub trait PersistentStore: Send {
    fn load(&self, key: &str) -> Result<Option<Vec<LineItem>>>;

    /// Overwrite the whole value under `key`.
    fn save(&self, key: &str, entries: &[LineItem]) -> Result<()>;
}

impl<P: PersistentStore + Sync> PersistentStore for std::sync::Arc<P> {
    fn load(&self, key: &str) -> Result<Option<Vec<LineItem>>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, entries: &[LineItem]) -> Result<()> {
        (**self).save(key, entries)
    }
}

/// JSON encoding of entries on top of a [`StorageBackend`].
pub struct StorageAdapter<B> {
    backend: B,
}

impl<B: StorageBackend> StorageAdapter<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The wrapped medium.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

/// Parse a stored value, enforcing the ledger's entry invariants.
pub fn parse_entries(raw: &str) -> Result<Vec<LineItem>> {
    let entries: Vec<LineItem> =
        serde_json::from_str(raw).map_err(|e| StoreError::Malformed(e.to_string()))?;

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in &entries {
        if entry.quantity == 0 {
            return Err(StoreError::Malformed(format!(
                "item {} stored with quantity 0",
                entry.item_id
            )));
        }
        if !seen.insert(&entry.item_id) {
            return Err(StoreError::Malformed(format!(
                "item {} stored more than once",
                entry.item_id
            )));
        }
    }

    Ok(entries)
}

/// Map medium failures onto the single condition callers handle.
fn unavailable(e: StoreError) -> StoreError {
    match e {
        StoreError::PersistenceUnavailable(_) => e,
        other => StoreError::PersistenceUnavailable(other.to_string()),
    }
}

impl<B: StorageBackend> PersistentStore for StorageAdapter<B> {
    fn load(&self, key: &str) -> Result<Option<Vec<LineItem>>> {
        let raw = match self.backend.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(StoreError::Malformed(reason)) => {
                tracing::warn!(key, %reason, "stored frame unreadable, treating as absent");
                return Ok(None);
            }
            Err(e) => return Err(unavailable(e)),
        };

        match parse_entries(&raw) {
            Ok(entries) => Ok(Some(entries)),
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value has unexpected shape, treating as absent");
                Ok(None)
            }
        }
    }

    fn save(&self, key: &str, entries: &[LineItem]) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        self.backend.set_item(key, &raw).map_err(unavailable)
    }
}

//! The ledger state machine.

use crate::error::Result;
use crate::ledger::action::Action;
use crate::ledger::transition::{apply_mutation, Mutation, Outcome, RemovePolicy};
use crate::storage::PersistentStore;
use crate::types::{ItemId, LedgerState, LineItem, Phase, Snapshot, DEFAULT_STORAGE_KEY};

/// Ledger configuration.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Key the entries are persisted under.
    pub storage_key: String,

    /// Dirty handling for removal of items that aren't held.
    pub remove_policy: RemovePolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            remove_policy: RemovePolicy::default(),
        }
    }
}

/// In-memory item quantities with deferred write-back.
///
/// Changes only reach the store on [`Ledger::flush`]. The ledger reads the
/// store once, on the first [`Ledger::load`].
pub struct Ledger<P> {
    config: LedgerConfig,
    store: P,
    phase: Phase,
    state: LedgerState,
}

impl<P: PersistentStore> Ledger<P> {
    /// Create an empty, uninitialized ledger.
    pub fn new(store: P, config: LedgerConfig) -> Self {
        Self {
            config,
            store,
            phase: Phase::Uninitialized,
            state: LedgerState::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn entries(&self) -> &[LineItem] {
        &self.state.entries
    }

    pub fn is_dirty(&self) -> bool {
        self.state.dirty
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    /// Quantity held for `item_id` (0 when absent).
    pub fn quantity_of(&self, item_id: &ItemId) -> u32 {
        self.state
            .position(item_id)
            .map(|idx| self.state.entries[idx].quantity)
            .unwrap_or(0)
    }

    /// Sum of all quantities.
    pub fn total_quantity(&self) -> u64 {
        self.state.entries.iter().map(|e| u64::from(e.quantity)).sum()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_state(&self.state)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &P {
        &self.store
    }

    /// Read the persisted entries.
    ///
    /// Only the first call reaches the store; later calls are no-ops. A
    /// persisted copy replaces the in-memory entries. With nothing persisted
    /// an empty sequence is written through, unless the ledger already holds
    /// entries. An unreachable store counts as nothing persisted, without the
    /// write-through. Never marks the ledger dirty.
    pub fn load(&mut self) -> Outcome {
        let key = self.config.storage_key.as_str();

        if self.phase == Phase::Loaded {
            tracing::debug!(key, "ledger already loaded, ignoring");
            return Outcome::Unchanged;
        }
        self.phase = Phase::Loaded;

        match self.store.load(key) {
            Ok(Some(entries)) => {
                tracing::info!(key, entries = entries.len(), "loaded ledger");
                let next = LedgerState {
                    entries,
                    dirty: false,
                };
                if next == self.state {
                    return Outcome::Unchanged;
                }
                self.state = next;
                Outcome::Changed
            }
            Ok(None) => {
                tracing::info!(key, "no persisted ledger");
                if self.state.entries.is_empty() {
                    if let Err(e) = self.store.save(key, &[]) {
                        tracing::warn!(key, error = %e, "could not initialize empty ledger");
                    }
                }
                Outcome::Unchanged
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "ledger storage unavailable, starting empty");
                Outcome::Unchanged
            }
        }
    }

    /// Add `quantity` units of `item_id`.
    pub fn add(&mut self, item_id: impl Into<ItemId>, quantity: u32) -> Result<Outcome> {
        self.mutate(Mutation::Add {
            item_id: item_id.into(),
            quantity,
        })
    }

    /// Take one unit of `item_id` away.
    pub fn remove(&mut self, item_id: impl Into<ItemId>) -> Outcome {
        // Removal has no failing inputs.
        self.mutate(Mutation::Remove {
            item_id: item_id.into(),
        })
        .unwrap_or(Outcome::Unchanged)
    }

    fn mutate(&mut self, mutation: Mutation) -> Result<Outcome> {
        if self.phase == Phase::Uninitialized {
            tracing::debug!(?mutation, "mutating ledger before load");
        }

        match apply_mutation(&self.state, mutation, self.config.remove_policy) {
            Ok(transition) => {
                self.state = transition.state;
                tracing::debug!(
                    entries = self.state.entries.len(),
                    dirty = self.state.dirty,
                    outcome = ?transition.outcome,
                    "applied mutation"
                );
                Ok(transition.outcome)
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected mutation");
                Err(e)
            }
        }
    }

    /// Persist the entries if they changed since the last flush.
    ///
    /// On failure the ledger stays dirty so a later flush retries.
    pub fn flush(&mut self) -> Result<Outcome> {
        if !self.state.dirty {
            return Ok(Outcome::Unchanged);
        }

        let key = self.config.storage_key.as_str();
        match self.store.save(key, &self.state.entries) {
            Ok(()) => {
                self.state.dirty = false;
                tracing::info!(key, entries = self.state.entries.len(), "flushed ledger");
                Ok(Outcome::Changed)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "flush failed, keeping changes pending");
                Err(e)
            }
        }
    }

    /// Apply any of the four operations.
    pub fn apply(&mut self, action: Action) -> Result<Outcome> {
        match action {
            Action::Load => Ok(self.load()),
            Action::Add { item_id, quantity } => self.add(item_id, quantity),
            Action::Remove { item_id } => Ok(self.remove(item_id)),
            Action::Flush => self.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::{MemoryBackend, StorageAdapter, StorageBackend};
    use std::sync::Arc;

    type Store = Arc<StorageAdapter<MemoryBackend>>;

    fn ledger() -> (Ledger<Store>, Store) {
        let store = Arc::new(StorageAdapter::new(MemoryBackend::new()));
        (Ledger::new(Arc::clone(&store), LedgerConfig::default()), store)
    }

    #[test]
    fn test_initial_state() {
        let (ledger, _) = ledger();
        assert_eq!(ledger.phase(), Phase::Uninitialized);
        assert!(ledger.is_empty());
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn test_load_absent_writes_empty_default() {
        let (mut ledger, store) = ledger();
        assert_eq!(ledger.load(), Outcome::Unchanged);

        assert_eq!(ledger.phase(), Phase::Loaded);
        assert!(ledger.is_empty());
        assert!(!ledger.is_dirty());
        assert_eq!(store.backend().get_item("cart").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_load_replaces_entries_without_dirty() {
        let (mut ledger, store) = ledger();
        let persisted = vec![LineItem::new(1u64, 2), LineItem::new(2u64, 1)];
        store.save("cart", &persisted).unwrap();

        assert_eq!(ledger.load(), Outcome::Changed);
        assert_eq!(ledger.entries(), persisted.as_slice());
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn test_reload_does_not_wipe() {
        let (mut ledger, store) = ledger();
        ledger.load();
        ledger.add(1u64, 1).unwrap();

        // Even if the store changes underneath, a second load is a no-op
        store.save("cart", &[LineItem::new(9u64, 9)]).unwrap();
        assert_eq!(ledger.load(), Outcome::Unchanged);
        assert_eq!(ledger.entries(), &[LineItem::new(1u64, 1)]);
        assert!(ledger.is_dirty());
    }

    #[test]
    fn test_entries_added_before_load_survive_empty_store() {
        let (mut ledger, store) = ledger();
        ledger.add(1u64, 1).unwrap();
        ledger.load();

        assert_eq!(ledger.entries(), &[LineItem::new(1u64, 1)]);
        assert!(ledger.is_dirty());
        // No empty default written over pending entries
        assert!(store.backend().get_item("cart").unwrap().is_none());
    }

    #[test]
    fn test_load_with_unavailable_storage() {
        let (mut ledger, store) = ledger();
        store.backend().set_disabled(true);

        assert_eq!(ledger.load(), Outcome::Unchanged);
        assert_eq!(ledger.phase(), Phase::Loaded);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_flush_clears_dirty_and_persists() {
        let (mut ledger, store) = ledger();
        ledger.load();
        ledger.add(1u64, 2).unwrap();
        ledger.add("sku", 1).unwrap();
        assert!(ledger.is_dirty());

        assert_eq!(ledger.flush().unwrap(), Outcome::Changed);
        assert!(!ledger.is_dirty());
        assert_eq!(store.load("cart").unwrap().unwrap(), ledger.entries());
    }

    #[test]
    fn test_flush_clean_is_noop() {
        let (mut ledger, store) = ledger();
        store.save("cart", &[LineItem::new(1u64, 1)]).unwrap();
        ledger.load();

        // Make the store unusable: a clean flush must not touch it
        store.backend().set_disabled(true);
        assert_eq!(ledger.flush().unwrap(), Outcome::Unchanged);
    }

    #[test]
    fn test_failed_flush_stays_dirty_and_retries() {
        let (mut ledger, store) = ledger();
        ledger.load();
        ledger.add(1u64, 1).unwrap();

        store.backend().set_disabled(true);
        assert!(matches!(
            ledger.flush(),
            Err(StoreError::PersistenceUnavailable(_))
        ));
        assert!(ledger.is_dirty());
        assert_eq!(ledger.entries(), &[LineItem::new(1u64, 1)]);

        store.backend().set_disabled(false);
        assert_eq!(ledger.flush().unwrap(), Outcome::Changed);
        assert!(!ledger.is_dirty());
        assert_eq!(store.load("cart").unwrap().unwrap(), vec![LineItem::new(1u64, 1)]);
    }

    #[test]
    fn test_rejected_add_leaves_state() {
        let (mut ledger, _) = ledger();
        ledger.load();
        assert!(ledger.add(1u64, 0).is_err());
        assert!(ledger.is_empty());
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn test_remove_policy_mark_dirty() {
        let store = Arc::new(StorageAdapter::new(MemoryBackend::new()));
        let mut ledger = Ledger::new(
            store,
            LedgerConfig {
                remove_policy: RemovePolicy::MarkDirty,
                ..Default::default()
            },
        );
        ledger.load();

        assert_eq!(ledger.remove(5u64), Outcome::Changed);
        assert!(ledger.is_empty());
        assert!(ledger.is_dirty());
    }

    #[test]
    fn test_apply_routes_actions() {
        let (mut ledger, store) = ledger();
        ledger.apply(Action::Load).unwrap();
        ledger.apply(Action::add(3u64, 2)).unwrap();
        ledger.apply(Action::remove(3u64)).unwrap();
        ledger.apply(Action::Flush).unwrap();

        assert_eq!(ledger.quantity_of(&ItemId::from(3u64)), 1);
        assert_eq!(ledger.total_quantity(), 1);
        assert_eq!(store.load("cart").unwrap().unwrap(), vec![LineItem::new(3u64, 1)]);
    }

    #[test]
    fn test_custom_storage_key() {
        let store = Arc::new(StorageAdapter::new(MemoryBackend::new()));
        let mut ledger = Ledger::new(
            Arc::clone(&store),
            LedgerConfig {
                storage_key: "wishlist".into(),
                ..Default::default()
            },
        );
        ledger.load();
        ledger.add(1u64, 1).unwrap();
        ledger.flush().unwrap();

        assert!(store.load("wishlist").unwrap().is_some());
        assert!(store.backend().get_item("cart").unwrap().is_none());
    }
}

//! Binding a ledger to process lifecycle.

use crate::controller::events::{EventBus, LedgerEvent, SnapshotSubscription, SubscriptionId};
use crate::controller::teardown::TeardownSource;
use crate::error::Result;
use crate::ledger::{Action, Ledger, LedgerConfig};
use crate::storage::PersistentStore;
use crate::types::{ItemId, Phase, Snapshot};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Controller configuration.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub ledger: LedgerConfig,

    /// Max buffered events per subscriber before it is dropped.
    pub subscriber_buffer: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            subscriber_buffer: 64,
        }
    }
}

struct Shared<P> {
    /// Serializes transitions: each runs to completion before the next.
    ledger: Mutex<Ledger<P>>,
    events: EventBus,
}

impl<P: PersistentStore> Shared<P> {
    fn dispatch(&self, action: Action) -> Result<Snapshot> {
        let is_flush = matches!(action, Action::Flush);
        let name = action.name();

        let mut ledger = self.ledger.lock();
        let outcome = ledger.apply(action)?;
        let snapshot = ledger.snapshot();

        tracing::debug!(action = name, ?outcome, "dispatched");

        if outcome.is_changed() {
            if is_flush {
                self.events.publish(LedgerEvent::Flushed {
                    entries: snapshot.entries.len(),
                });
            }
            self.events.publish(LedgerEvent::Changed {
                snapshot: snapshot.clone(),
            });
        }

        Ok(snapshot)
    }

    /// Flush outside of a caller's dispatch.
    fn final_flush(&self, reason: &str) -> Result<()> {
        match self.dispatch(Action::Flush) {
            Ok(_) => {
                tracing::info!(reason, "final flush complete");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(reason, error = %e, "final flush failed, changes lost");
                Err(e)
            }
        }
    }
}

/// Owns a ledger for one session.
///
/// Loads the persisted entries on construction and flushes them on
/// teardown, on [`LedgerController::shutdown`], and on drop. Readers get
/// [`Snapshot`]s; writers go through [`LedgerController::dispatch`].
pub struct LedgerController<P: PersistentStore + 'static> {
    shared: Arc<Shared<P>>,
}

impl<P: PersistentStore + 'static> LedgerController<P> {
    /// Load the ledger from `store` and register a flush with `teardown`.
    pub fn new<T>(store: P, teardown: &T, config: ControllerConfig) -> Self
    where
        T: TeardownSource + ?Sized,
    {
        let mut ledger = Ledger::new(store, config.ledger);
        ledger.load();

        let shared = Arc::new(Shared {
            ledger: Mutex::new(ledger),
            events: EventBus::new(config.subscriber_buffer),
        });

        let weak: Weak<Shared<P>> = Arc::downgrade(&shared);
        teardown.register(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                let _ = shared.final_flush("teardown");
            }
        }));

        Self { shared }
    }

    /// Apply an action and return the resulting snapshot.
    ///
    /// On error the ledger is unchanged.
    pub fn dispatch(&self, action: Action) -> Result<Snapshot> {
        self.shared.dispatch(action)
    }

    /// Decode and apply a tagged action value such as
    /// `{"type":"ADD","value":{"productId":1,"quantity":1}}`.
    pub fn dispatch_json(&self, raw: &str) -> Result<Snapshot> {
        let action = Action::from_json(raw).map_err(|e| {
            tracing::warn!(error = %e, "rejected action");
            e
        })?;
        self.dispatch(action)
    }

    pub fn add(&self, item_id: impl Into<ItemId>, quantity: u32) -> Result<Snapshot> {
        self.dispatch(Action::add(item_id, quantity))
    }

    pub fn remove(&self, item_id: impl Into<ItemId>) -> Result<Snapshot> {
        self.dispatch(Action::remove(item_id))
    }

    pub fn flush(&self) -> Result<Snapshot> {
        self.dispatch(Action::Flush)
    }

    /// Current read-only view.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.ledger.lock().snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.shared.ledger.lock().phase()
    }

    /// Receive a [`LedgerEvent`] after every change.
    pub fn subscribe(&self) -> SnapshotSubscription {
        self.shared.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.events.unsubscribe(id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.events.len()
    }

    /// Flush and release the ledger, reporting whether the flush worked.
    pub fn shutdown(self) -> Result<()> {
        self.shared.final_flush("shutdown")
    }
}

impl<P: PersistentStore + 'static> Drop for LedgerController<P> {
    fn drop(&mut self) {
        // Best-effort flush on drop
        if self.shared.ledger.lock().is_dirty() {
            let _ = self.shared.final_flush("drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::teardown::ManualTeardown;
    use crate::error::StoreError;
    use crate::storage::{MemoryBackend, StorageAdapter, StorageBackend};
    use crate::types::LineItem;

    type Store = Arc<StorageAdapter<MemoryBackend>>;

    fn setup() -> (LedgerController<Store>, Store, ManualTeardown) {
        let store = Arc::new(StorageAdapter::new(MemoryBackend::new()));
        let teardown = ManualTeardown::new();
        let controller =
            LedgerController::new(Arc::clone(&store), &teardown, ControllerConfig::default());
        (controller, store, teardown)
    }

    #[test]
    fn test_loads_on_construction() {
        let store = Arc::new(StorageAdapter::new(MemoryBackend::new()));
        store.save("cart", &[LineItem::new(1u64, 2)]).unwrap();

        let teardown = ManualTeardown::new();
        let controller =
            LedgerController::new(Arc::clone(&store), &teardown, ControllerConfig::default());

        assert_eq!(controller.phase(), Phase::Loaded);
        assert_eq!(&*controller.snapshot().entries, &[LineItem::new(1u64, 2)]);
        assert!(!controller.snapshot().dirty);
        assert_eq!(teardown.pending(), 1);
    }

    #[test]
    fn test_teardown_flushes() {
        let (controller, store, teardown) = setup();
        controller.add(1u64, 1).unwrap();
        controller.add(1u64, 2).unwrap();
        assert_eq!(store.load("cart").unwrap(), Some(vec![]));

        teardown.fire();

        assert_eq!(store.load("cart").unwrap(), Some(vec![LineItem::new(1u64, 3)]));
        assert!(!controller.snapshot().dirty);
    }

    #[test]
    fn test_teardown_after_drop_is_harmless() {
        let (controller, store, teardown) = setup();
        controller.add(2u64, 1).unwrap();
        drop(controller);

        // Drop already flushed; the hook finds nothing to do
        assert_eq!(teardown.fire(), 1);
        assert_eq!(store.load("cart").unwrap(), Some(vec![LineItem::new(2u64, 1)]));
    }

    #[test]
    fn test_shutdown_reports_failure() {
        let (controller, store, _teardown) = setup();
        controller.add(1u64, 1).unwrap();
        store.backend().set_disabled(true);

        assert!(matches!(
            controller.shutdown(),
            Err(StoreError::PersistenceUnavailable(_))
        ));
    }

    #[test]
    fn test_dispatch_json() {
        let (controller, _, _) = setup();
        let snap = controller
            .dispatch_json(r#"{"type":"ADD","value":{"productId":5,"quantity":2}}"#)
            .unwrap();
        assert_eq!(snap.quantity_of(&ItemId::from(5u64)), 2);

        let result = controller.dispatch_json(r#"{"type":"CHECKOUT"}"#);
        assert!(matches!(result, Err(StoreError::UnknownAction(_))));
        assert_eq!(controller.snapshot(), snap);
    }

    #[test]
    fn test_subscribers_see_changes() {
        let (controller, _, _) = setup();
        let sub = controller.subscribe();

        controller.add(1u64, 1).unwrap();
        controller.remove(7u64).unwrap();
        controller.flush().unwrap();
        controller.flush().unwrap();

        let events = sub.drain();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], LedgerEvent::Changed { snapshot } if snapshot.dirty));
        assert!(matches!(events[1], LedgerEvent::Flushed { entries: 1 }));
        assert!(matches!(&events[2], LedgerEvent::Changed { snapshot } if !snapshot.dirty));
    }

    #[test]
    fn test_rejected_action_publishes_nothing() {
        let (controller, _, _) = setup();
        let sub = controller.subscribe();

        assert!(controller.add(1u64, 0).is_err());
        assert!(sub.drain().is_empty());
    }
}

//! Change notifications for ledger readers.

use crate::types::Snapshot;
use crossbeam_channel::{bounded, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Events delivered to subscribers.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Entries or the dirty flag changed.
    Changed { snapshot: Snapshot },

    /// Pending changes reached storage.
    Flushed { entries: usize },

    /// The subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiving end of a subscription.
pub struct SnapshotSubscription {
    pub id: SubscriptionId,
    receiver: Receiver<LedgerEvent>,
}

impl SnapshotSubscription {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<LedgerEvent, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<LedgerEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<LedgerEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<LedgerEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Fan-out of ledger events to bounded subscriber queues.
pub(crate) struct EventBus {
    subscribers: RwLock<HashMap<SubscriptionId, Sender<LedgerEvent>>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl EventBus {
    pub(crate) fn new(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
        }
    }

    pub(crate) fn subscribe(&self) -> SnapshotSubscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.buffer_size);
        self.subscribers.write().insert(id, sender);
        SnapshotSubscription { id, receiver }
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(sender) = self.subscribers.write().remove(&id) {
            let _ = sender.try_send(LedgerEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Send to every subscriber, dropping those that are full or gone.
    pub(crate) fn publish(&self, event: LedgerEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscribers.read();
            for (id, sender) in subs.iter() {
                if sender.try_send(event.clone()).is_err() {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscribers.write();
            for id in to_remove {
                if let Some(sender) = subs.remove(&id) {
                    tracing::debug!(subscription = id.0, "dropping slow ledger subscriber");
                    let _ = sender.try_send(LedgerEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

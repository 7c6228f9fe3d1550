//! Lifecycle binding for a ledger.
//!
//! [`LedgerController`] loads the ledger once when it is built, flushes it
//! when the injected [`TeardownSource`] fires, and hands out snapshots and a
//! single dispatch entry point to the rest of the application.
//!
//! # Example
//!
//! ```ignore
//! let teardown = ManualTeardown::new();
//! let store = StorageAdapter::new(MemoryBackend::new());
//! let cart = LedgerController::new(store, &teardown, ControllerConfig::default());
//!
//! cart.add(42u64, 1)?;
//! cart.dispatch_json(r#"{"type":"REMOVE","value":{"productId":42}}"#)?;
//!
//! // On shutdown
//! teardown.fire();
//! ```

mod events;
mod lifecycle;
mod teardown;

pub use events::{DropReason, LedgerEvent, SnapshotSubscription, SubscriptionId};
pub use lifecycle::{ControllerConfig, LedgerController};
pub use teardown::{ChannelTeardown, ManualTeardown, TeardownHook, TeardownSource, TeardownTrigger};

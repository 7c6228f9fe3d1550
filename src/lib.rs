//! # Cart Ledger
//!
//! A client-side store of item quantities with deferred persistence.
//!
//! ## Core Concepts
//!
//! - **Ledger**: ordered `(item, quantity)` entries; adds merge, removes take
//!   one unit, empty entries disappear
//! - **Dirty flag**: set by every change, cleared when the entries reach storage
//! - **Storage**: a key-value medium holding the entries as JSON under `"cart"`
//! - **Controller**: loads once at startup, flushes at teardown
//!
//! ## Example
//!
//! ```ignore
//! use cart_ledger::{
//!     ControllerConfig, FileBackend, FileBackendConfig, LedgerController, ManualTeardown,
//!     StorageAdapter,
//! };
//!
//! let backend = FileBackend::open_or_create(FileBackendConfig {
//!     path: "./cart-data".into(),
//!     ..Default::default()
//! })?;
//! let teardown = ManualTeardown::new();
//! let cart = LedgerController::new(
//!     StorageAdapter::new(backend),
//!     &teardown,
//!     ControllerConfig::default(),
//! );
//!
//! cart.add(7u64, 2)?;
//! cart.remove(7u64)?;
//! assert_eq!(cart.snapshot().total_quantity(), 1);
//!
//! teardown.fire();
//! ```

pub mod controller;
pub mod error;
pub mod ledger;
pub mod storage;
pub mod types;

// Re-exports
pub use controller::{
    ChannelTeardown, ControllerConfig, DropReason, LedgerController, LedgerEvent,
    ManualTeardown, SnapshotSubscription, SubscriptionId, TeardownHook, TeardownSource,
    TeardownTrigger,
};
pub use error::{Result, StoreError};
pub use ledger::{
    apply_mutation, Action, Ledger, LedgerConfig, Mutation, Outcome, RemovePolicy, Transition,
};
pub use storage::{
    parse_entries, FileBackend, FileBackendConfig, MemoryBackend, PersistentStore,
    StorageAdapter, StorageBackend,
};
pub use types::*;

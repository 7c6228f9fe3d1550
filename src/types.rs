//! Core types for the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Storage key the cart is persisted under.
pub const DEFAULT_STORAGE_KEY: &str = "cart";

/// Opaque identifier of a ledger item.
///
/// Compared by value. Persisted untagged, so numeric product ids round-trip
/// as JSON numbers and textual SKUs as JSON strings.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(u64),
    Text(String),
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{}", n),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        ItemId::Number(n)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Text(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::Text(s)
    }
}

/// One (item, quantity) entry of the ledger.
///
/// `quantity` is at least 1 for every entry held by a ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "productId")]
    pub item_id: ItemId,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(item_id: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// In-memory ledger state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerState {
    /// Entries in insertion order, at most one per item id.
    pub entries: Vec<LineItem>,
    /// True iff `entries` diverged from the last persisted copy.
    pub dirty: bool,
}

impl LedgerState {
    /// Index of the entry for `item_id`, if any.
    pub fn position(&self, item_id: &ItemId) -> Option<usize> {
        self.entries.iter().position(|e| &e.item_id == item_id)
    }
}

/// Lifecycle phase of a ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing has been read from storage yet.
    Uninitialized,
    /// The persisted copy (or the empty default) has been loaded.
    Loaded,
}

/// Read-only view of the ledger handed to renderers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub entries: Arc<[LineItem]>,
    pub dirty: bool,
}

impl Snapshot {
    pub fn from_state(state: &LedgerState) -> Self {
        Self {
            entries: state.entries.clone().into(),
            dirty: state.dirty,
        }
    }

    /// Quantity held for `item_id` (0 when absent).
    pub fn quantity_of(&self, item_id: &ItemId) -> u32 {
        self.entries
            .iter()
            .find(|e| &e.item_id == item_id)
            .map(|e| e.quantity)
            .unwrap_or(0)
    }

    /// Sum of all quantities.
    pub fn total_quantity(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.quantity)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

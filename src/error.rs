//! Error types for the ledger.

use crate::types::ItemId;
use thiserror::Error;

/// Main error type for ledger and storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The storage medium is inaccessible or refused the write.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// A stored value did not have the expected shape.
    #[error("Malformed stored value: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid quantity {quantity} for item {item_id}: must be at least 1")]
    InvalidQuantity { item_id: ItemId, quantity: u32 },

    #[error("Quantity overflow for item {0}")]
    QuantityOverflow(ItemId),

    #[error("Unknown action type: {0}")]
    UnknownAction(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Storage directory is locked by another process")]
    Locked,
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, StoreError>;

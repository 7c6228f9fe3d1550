//! Raw key-value storage media.

use crate::error::{Result, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// A string key-value medium, shaped like the web storage API.
///
/// Backends know nothing about the values they hold. Failures to reach the
/// medium are reported as [`StoreError::PersistenceUnavailable`] (or
/// [`StoreError::Io`] for filesystem media); a stored value that cannot be
/// decoded by the backend's own framing is [`StoreError::Malformed`].
pub trait StorageBackend: Send + Sync {
    /// Read the value under `key`.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the value under `key`. Deleting a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// In-process storage medium.
///
/// An optional byte quota and a disabled switch model the two ways a browser
/// store refuses service.
pub struct MemoryBackend {
    items: Mutex<HashMap<String, String>>,
    /// Max total bytes of keys plus values (None = unbounded).
    quota: Option<usize>,
    disabled: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota: None,
            disabled: AtomicBool::new(false),
        }
    }

    /// A backend refusing writes that would exceed `bytes` in total.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::new()
        }
    }

    /// Make every subsequent call fail as if storage were turned off.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    fn check_enabled(&self) -> Result<()> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StoreError::PersistenceUnavailable(
                "storage is disabled".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.check_enabled()?;
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.check_enabled()?;
        let mut items = self.items.lock();

        if let Some(quota) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StoreError::PersistenceUnavailable(format!(
                    "quota exceeded: {} bytes needed, {} allowed",
                    needed, quota
                )));
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.check_enabled()?;
        self.items.lock().remove(key);
        Ok(())
    }
}

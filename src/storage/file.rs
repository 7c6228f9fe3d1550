//! Directory-backed storage medium.
//!
//! Each key lives in its own file:
//!
//! ```text
//! magic "LDG\0" | version u8 | payload len u64 LE | payload | crc32 u32 LE
//! ```
//!
//! Writes land in a temp file that is renamed over the target, so a reader
//! sees either the old or the new value.

use crate::error::{Result, StoreError};
use crate::storage::backend::StorageBackend;
use fs2::FileExt;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for item files.
const ITEM_MAGIC: &[u8; 4] = b"LDG\0";

/// Current item file format version.
const ITEM_VERSION: u8 = 1;

/// Header size: magic + version + payload length.
const HEADER_LEN: usize = 4 + 1 + 8;

/// File backend configuration.
#[derive(Clone, Debug)]
pub struct FileBackendConfig {
    /// Directory holding one file per key.
    pub path: PathBuf,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./ledger"),
            create_if_missing: true,
        }
    }
}

/// Storage medium keeping each key in a checksummed file.
///
/// Holds an exclusive lock on the directory for its lifetime.
pub struct FileBackend {
    path: PathBuf,
    _lock_file: File,
}

impl FileBackend {
    /// Open an existing directory or create it.
    pub fn open_or_create(config: FileBackendConfig) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(StoreError::PersistenceUnavailable(format!(
                    "storage directory {} does not exist",
                    config.path.display()
                )));
            }
            fs::create_dir_all(&config.path)?;
        }

        let lock_file = Self::acquire_lock(&config.path)?;
        tracing::debug!(path = %config.path.display(), "opened file storage");

        Ok(Self {
            path: config.path,
            _lock_file: lock_file,
        })
    }

    /// Directory this backend writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }

    /// File path for a key. Bytes outside `[A-Za-z0-9_.-]` are percent-escaped.
    pub(crate) fn item_path(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for b in key.bytes() {
            if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.') {
                name.push(b as char);
            } else {
                name.push_str(&format!("%{:02X}", b));
            }
        }
        name.push_str(".item");
        self.path.join(name)
    }

    fn encode(value: &str) -> Vec<u8> {
        let payload = value.as_bytes();
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + 4);
        buf.extend_from_slice(ITEM_MAGIC);
        buf.push(ITEM_VERSION);
        buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        buf
    }

    fn decode(bytes: &[u8]) -> Result<String> {
        if bytes.len() < HEADER_LEN + 4 {
            return Err(StoreError::Malformed("truncated item file".into()));
        }
        if &bytes[0..4] != ITEM_MAGIC {
            return Err(StoreError::Malformed("invalid item magic".into()));
        }
        if bytes[4] != ITEM_VERSION {
            return Err(StoreError::Malformed(format!(
                "unsupported item version: {}",
                bytes[4]
            )));
        }

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[5..HEADER_LEN]);
        let len = usize::try_from(u64::from_le_bytes(len_bytes)).ok();

        // Length checked before any arithmetic on it
        let len = match len {
            Some(len) if len == bytes.len() - HEADER_LEN - 4 => len,
            _ => {
                return Err(StoreError::Malformed(format!(
                    "payload length {} does not match file size {}",
                    u64::from_le_bytes(len_bytes),
                    bytes.len()
                )))
            }
        };

        let payload = &bytes[HEADER_LEN..HEADER_LEN + len];
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&bytes[HEADER_LEN + len..]);
        let stored = u32::from_le_bytes(crc_bytes);
        let computed = crc32fast::hash(payload);
        if stored != computed {
            return Err(StoreError::Malformed(format!(
                "checksum mismatch: expected {}, got {}",
                stored, computed
            )));
        }

        String::from_utf8(payload.to_vec())
            .map_err(|e| StoreError::Malformed(format!("payload is not UTF-8: {}", e)))
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let bytes = match fs::read(self.item_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::decode(&bytes).map(Some)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let target = self.item_path(key);
        let tmp = target.with_extension("item.tmp");

        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(&Self::encode(value))?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        });

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.item_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

//! Per-plugin persistent key-value storage.
//!
//! Each plugin receives a [`Storage`] handle rooted at its own directory.
//! The backing file (`storage.json`) is loaded once at open and rewritten on
//! every mutation. Handles are private per plugin and never shared.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// File name of the backing store inside the plugin directory.
pub const STORAGE_FILE: &str = "storage.json";

/// Errors raised by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing file could not be read or written.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be serialized or deserialized.
    #[error("storage codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

struct Inner {
    path: PathBuf,
    entries: Mutex<HashMap<String, Value>>,
}

/// A persistent key-value store rooted at one plugin's directory.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<Inner>,
}

impl Storage {
    /// Opens (or creates) the store inside `dir`.
    ///
    /// A corrupt backing file is an error; the manager excludes the plugin
    /// rather than silently discarding its data.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        let path = dir.join(STORAGE_FILE);
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            HashMap::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "Storage opened");
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                entries: Mutex::new(entries),
            }),
        })
    }

    /// Reads and deserializes the value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let entries = self.inner.entries.lock();
        match entries.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Serializes and stores `value` under `key`, then flushes.
    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) -> StorageResult<()> {
        let value = serde_json::to_value(value)?;
        let mut entries = self.inner.entries.lock();
        entries.insert(key.into(), value);
        self.flush_locked(&entries)
    }

    /// Removes `key`, flushing when it existed.
    pub fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut entries = self.inner.entries.lock();
        if entries.remove(key).is_some() {
            self.flush_locked(&entries)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// All stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.lock().keys().cloned().collect()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn flush_locked(&self, entries: &HashMap<String, Value>) -> StorageResult<()> {
        let raw = serde_json::to_vec_pretty(entries)?;
        std::fs::write(&self.inner.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        hits: u64,
    }

    #[test]
    fn roundtrip_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        storage.set("counter", &Counter { hits: 3 }).unwrap();
        assert_eq!(
            storage.get::<Counter>("counter").unwrap(),
            Some(Counter { hits: 3 })
        );

        // A fresh handle sees the flushed state.
        let reopened = Storage::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get::<Counter>("counter").unwrap(),
            Some(Counter { hits: 3 })
        );
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        storage.set("k", &1).unwrap();
        assert!(storage.remove("k").unwrap());
        assert!(!storage.remove("k").unwrap());
        assert_eq!(storage.get::<i64>("k").unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORAGE_FILE), b"{not json").unwrap();
        assert!(Storage::open(dir.path()).is_err());
    }
}

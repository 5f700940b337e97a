use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Synchronous string key/value storage that survives restarts.
///
/// Writes are synchronous so a mutation and its persistence happen in one step.
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read a JSON value, falling back to `None` when the key is missing or the value is unreadable.
pub fn load_json<T: DeserializeOwned>(storage: &dyn LocalStorage, key: &str) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Could not read {} from storage: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Discarding unreadable {} entry: {}", key, e);
            None
        }
    }
}

/// Write a JSON value. Failures are logged, never returned: the in-memory state stays authoritative.
pub fn save_json<T: Serialize>(storage: &dyn LocalStorage, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(StorageError::from)
        .and_then(|raw| storage.set(key, &raw));

    if let Err(e) = result {
        warn!("Failed to persist {}: {}", key, e);
    }
}

/// All keys in one JSON document on disk, rewritten on every change.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or start) the storage file. A corrupt file is treated as empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Storage file {} is corrupt, starting empty: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("Opened storage {} with {} keys", path.display(), entries.len());
        Ok(Self { path, entries: Mutex::new(entries) })
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Process-local storage, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/local_storage.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set("fooddala_cart", r#"{"items":[]}"#).unwrap();
        storage.set("userLocation", r#"{"city":"Mysuru"}"#).unwrap();
        storage.remove("userLocation").unwrap();
        drop(storage);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("fooddala_cart").unwrap().as_deref(), Some(r#"{"items":[]}"#));
        assert_eq!(reopened.get("userLocation").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local_storage.json");
        fs::write(&path, "{ not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.get("fooddala_cart").unwrap(), None);
    }

    #[test]
    fn test_load_json_fails_soft() {
        let storage = MemoryStorage::new();
        storage.set("fooddala_cart", "[[[").unwrap();

        let loaded: Option<Vec<u32>> = load_json(&storage, "fooddala_cart");
        assert!(loaded.is_none());

        save_json(&storage, "numbers", &vec![1u32, 2, 3]);
        let loaded: Option<Vec<u32>> = load_json(&storage, "numbers");
        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }
}

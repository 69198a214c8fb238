//! Durable key-value store used for the learner profile and cached content.
//!
//! Two backends:
//!   - `MemoryStore`: process-local map (tests, or no store path configured)
//!   - `JsonFileStore`: one JSON object on disk, rewritten on every change
//!
//! Both are `Send + Sync` and take `&self`, so they can sit behind an `Arc`.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store payload is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the guard cannot leave a map half-written.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store file. A missing file is an empty store.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str::<BTreeMap<String, String>>(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(target: "store", path = %path.display(), keys = entries.len(), "Opened JSON file store");
        Ok(Self { path, entries: Mutex::new(entries) })
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(target: "store", path = %self.path.display(), keys = entries.len(), "Flushed store");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Read and decode a JSON value. Missing keys and undecodable payloads both yield None;
/// the latter is logged so a corrupted cache entry is visible.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(target: "store", %key, error = %e, "Discarding undecodable store entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(target: "store", %key, error = %e, "Store read failed");
            None
        }
    }
}

/// Encode and write a JSON value.
pub fn save_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("smartkid-store-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn memory_store_set_get_remove() {
        let s = MemoryStore::new();
        assert_eq!(s.get("k").expect("get"), None);
        s.set("k", "v").expect("set");
        assert_eq!(s.get("k").expect("get").as_deref(), Some("v"));
        s.remove("k").expect("remove");
        assert_eq!(s.get("k").expect("get"), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = temp_path("reopen");
        {
            let s = JsonFileStore::open(&path).expect("open");
            s.set("smartkid-user", r#"{"level":3}"#).expect("set");
            s.set("other", "x").expect("set");
            s.remove("other").expect("remove");
        }
        let s = JsonFileStore::open(&path).expect("reopen");
        assert_eq!(s.get("smartkid-user").expect("get").as_deref(), Some(r#"{"level":3}"#));
        assert_eq!(s.get("other").expect("get"), None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "not json").expect("write");
        assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Serde(_))));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_json_discards_garbage() {
        let s = MemoryStore::new();
        s.set("nums", "[1,2").expect("set");
        assert_eq!(load_json::<Vec<u32>>(&s, "nums"), None);
        save_json(&s, "nums", &vec![1u32, 2]).expect("save");
        assert_eq!(load_json::<Vec<u32>>(&s, "nums"), Some(vec![1, 2]));
    }
}

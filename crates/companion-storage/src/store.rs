//! Keyed persistent store.
//!
//! The store is a flat key/value space: each key holds the JSON array of
//! records for one category (or one memory shard). [`RocksStore`] is the
//! durable implementation; [`MemoryStore`] backs tests and embedded hosts
//! that persist elsewhere.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use rocksdb::{IteratorMode, Options, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::StoreError;

/// Flat keyed byte store.
pub trait KeyedStore: Send + Sync {
    /// Read the value at `key`, if present.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the value at `key` atomically.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Enumerate all keys.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Load the JSON array persisted at `key`; absent key reads as empty.
pub fn load_array<T: DeserializeOwned>(
    store: &dyn KeyedStore,
    key: &str,
) -> Result<Vec<T>, StoreError> {
    match store.get(key)? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Ok(Vec::new()),
    }
}

/// Persist `items` as the JSON array at `key`.
pub fn save_array<T: Serialize>(
    store: &dyn KeyedStore,
    key: &str,
    items: &[T],
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(items)?;
    store.set(key, &bytes)?;
    debug!(key = %key, count = items.len(), "persisted record array");
    Ok(())
}

/// RocksDB-backed keyed store using the default column family.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open the store at `path`, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("opening keyed store at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);

        let db = DB::open(&db_opts, path)?;
        Ok(Self { db })
    }
}

impl KeyedStore for RocksStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key.as_bytes())?)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for item in self.db.iterator(IteratorMode::Start) {
            let (key, _) = item?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }
}

/// In-memory keyed store for tests and embedded hosts.
pub struct MemoryStore {
    map: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyedStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let map = self
            .map
            .read()
            .map_err(|e| StoreError::Store(format!("lock poisoned: {e}")))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut map = self
            .map
            .write()
            .map_err(|e| StoreError::Store(format!("lock poisoned: {e}")))?;
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let map = self
            .map
            .read()
            .map_err(|e| StoreError::Store(format!("lock poisoned: {e}")))?;
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Probe {
        id: String,
        value: u32,
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());

        store.set("k", b"[1,2,3]").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"[1,2,3]");
        assert_eq!(store.keys().unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn test_load_array_absent_key_is_empty() {
        let store = MemoryStore::new();
        let items: Vec<Probe> = load_array(&store, "missing").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_save_and_load_array() {
        let store = MemoryStore::new();
        let items = vec![
            Probe {
                id: "a".to_string(),
                value: 1,
            },
            Probe {
                id: "b".to_string(),
                value: 2,
            },
        ];
        save_array(&store, "probes", &items).unwrap();

        let back: Vec<Probe> = load_array(&store, "probes").unwrap();
        assert_eq!(back, items);
    }

    #[test]
    fn test_rocks_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        store.set("characters", b"[]").unwrap();
        store.set("global_memories", b"[{}]").unwrap();

        assert_eq!(store.get("characters").unwrap().unwrap(), b"[]");
        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["characters", "global_memories"]);
    }
}

//! Per-category repositories over the keyed store.
//!
//! One capability, three persistence shapes:
//! - flat JSON array under a single key (characters, style preferences)
//! - entries nested inside the lorebook array (lorebook entries)
//! - arrays sharded by scope key (memories)
//!
//! The pipeline only sees [`RecordRepository`], so it stays shape-agnostic.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use companion_types::{is_memory_shard_key, EmbeddableRecord, Lorebook, LorebookEntry, MemoryRecord};

use crate::error::StoreError;
use crate::keys::LOREBOOKS_KEY;
use crate::store::{load_array, save_array, KeyedStore};

/// Load and upsert records of one category.
///
/// `upsert_many` performs the full read-modify-write: each touched store
/// key is replaced atomically once the merged array is built.
pub trait RecordRepository<T>: Send + Sync {
    /// Load every persisted record of this category.
    fn load(&self) -> Result<Vec<T>, StoreError>;

    /// Merge `items` into the persisted arrays by record id.
    ///
    /// Returns the number of records written.
    fn upsert_many(&self, items: &[T]) -> Result<usize, StoreError>;
}

/// Flat single-key repository: the whole category is one JSON array.
pub struct FlatRepository<T> {
    store: Arc<dyn KeyedStore>,
    key: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FlatRepository<T> {
    /// Create a repository over `key`.
    pub fn new(store: Arc<dyn KeyedStore>, key: &'static str) -> Self {
        Self {
            store,
            key,
            _marker: PhantomData,
        }
    }
}

impl<T> RecordRepository<T> for FlatRepository<T>
where
    T: EmbeddableRecord + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn load(&self) -> Result<Vec<T>, StoreError> {
        load_array(self.store.as_ref(), self.key)
    }

    fn upsert_many(&self, items: &[T]) -> Result<usize, StoreError> {
        if items.is_empty() {
            return Ok(0);
        }

        // Clone the persisted collection, update matched records in
        // place, then replace the whole array in one write.
        let mut stored: Vec<T> = load_array(self.store.as_ref(), self.key)?;
        for item in items {
            match stored
                .iter_mut()
                .find(|r| r.record_id() == item.record_id())
            {
                Some(slot) => *slot = item.clone(),
                None => stored.push(item.clone()),
            }
        }
        save_array(self.store.as_ref(), self.key, &stored)?;
        Ok(items.len())
    }
}

/// Lorebook-entry repository: entries live nested inside the lorebook
/// array and keep their parent book on write.
pub struct LorebookRepository {
    store: Arc<dyn KeyedStore>,
}

impl LorebookRepository {
    /// Create a repository over the lorebook key.
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    /// Load the full lorebook array, book structure intact.
    pub fn load_books(&self) -> Result<Vec<Lorebook>, StoreError> {
        load_array(self.store.as_ref(), LOREBOOKS_KEY)
    }

    /// Replace the full lorebook array.
    pub fn save_books(&self, books: &[Lorebook]) -> Result<(), StoreError> {
        save_array(self.store.as_ref(), LOREBOOKS_KEY, books)
    }
}

impl RecordRepository<LorebookEntry> for LorebookRepository {
    fn load(&self) -> Result<Vec<LorebookEntry>, StoreError> {
        Ok(self
            .load_books()?
            .into_iter()
            .flat_map(|book| book.entries)
            .collect())
    }

    fn upsert_many(&self, items: &[LorebookEntry]) -> Result<usize, StoreError> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut books = self.load_books()?;
        let mut written = 0;
        for entry in items {
            // An entry with no parent book left in the store is ignored;
            // it cannot be placed without inventing a book for it.
            let slot = books
                .iter_mut()
                .flat_map(|book| book.entries.iter_mut())
                .find(|e| e.id == entry.id);
            if let Some(slot) = slot {
                *slot = entry.clone();
                written += 1;
            }
        }
        if written > 0 {
            self.save_books(&books)?;
        }
        Ok(written)
    }
}

/// Sharded memory repository: records fan out across per-scope shard keys.
pub struct MemoryShardRepository {
    store: Arc<dyn KeyedStore>,
}

impl MemoryShardRepository {
    /// Create a repository over the memory shards.
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    /// Load one shard by key.
    pub fn load_shard(&self, shard: &str) -> Result<Vec<MemoryRecord>, StoreError> {
        load_array(self.store.as_ref(), shard)
    }
}

impl RecordRepository<MemoryRecord> for MemoryShardRepository {
    fn load(&self) -> Result<Vec<MemoryRecord>, StoreError> {
        let mut all = Vec::new();
        for key in self.store.keys()? {
            if is_memory_shard_key(&key) {
                all.extend(self.load_shard(&key)?);
            }
        }
        Ok(all)
    }

    fn upsert_many(&self, items: &[MemoryRecord]) -> Result<usize, StoreError> {
        if items.is_empty() {
            return Ok(0);
        }

        // Group by shard key so untouched shards are never read or
        // written. BTreeMap keeps the write order deterministic.
        let mut by_shard: BTreeMap<String, Vec<&MemoryRecord>> = BTreeMap::new();
        for item in items {
            by_shard.entry(item.shard_key()).or_default().push(item);
        }

        let mut written = 0;
        for (shard, records) in by_shard {
            let mut stored = self.load_shard(&shard)?;
            for record in records {
                match stored.iter_mut().find(|r| r.id == record.id) {
                    Some(slot) => *slot = record.clone(),
                    None => stored.push(record.clone()),
                }
                written += 1;
            }
            save_array(self.store.as_ref(), &shard, &stored)?;
            debug!(shard = %shard, count = stored.len(), "memory shard written");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::CHARACTERS_KEY;
    use crate::store::MemoryStore;
    use companion_types::{Character, MemoryScope};

    fn store() -> Arc<dyn KeyedStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_flat_upsert_updates_and_appends() {
        let store = store();
        let repo: FlatRepository<Character> = FlatRepository::new(store, CHARACTERS_KEY);

        let mut a = Character::new("Mira", "Cartographer");
        let b = Character::new("Oren", "Archivist");
        repo.upsert_many(&[a.clone(), b.clone()]).unwrap();

        a.embedding = vec![0.5, 0.5];
        let written = repo.upsert_many(std::slice::from_ref(&a)).unwrap();
        assert_eq!(written, 1);

        let loaded = repo.load().unwrap();
        assert_eq!(loaded.len(), 2);
        let stored_a = loaded.iter().find(|c| c.id == a.id).unwrap();
        assert_eq!(stored_a.embedding, vec![0.5, 0.5]);
        // The other record is untouched.
        let stored_b = loaded.iter().find(|c| c.id == b.id).unwrap();
        assert!(stored_b.embedding.is_empty());
    }

    #[test]
    fn test_lorebook_upsert_keeps_book_structure() {
        let store = store();
        let repo = LorebookRepository::new(store);

        let mut entry = LorebookEntry::new("The Vale", "A fog-bound valley.");
        let book = Lorebook::new("world")
            .with_entry(entry.clone())
            .with_entry(LorebookEntry::new("The Spire", "A basalt tower."));
        repo.save_books(&[book]).unwrap();

        entry.embedding = vec![1.0, 0.0];
        let written = repo.upsert_many(std::slice::from_ref(&entry)).unwrap();
        assert_eq!(written, 1);

        let books = repo.load_books().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].entries.len(), 2);
        assert_eq!(books[0].entries[0].embedding, vec![1.0, 0.0]);
        assert!(books[0].entries[1].embedding.is_empty());
    }

    #[test]
    fn test_lorebook_upsert_ignores_orphan_entries() {
        let store = store();
        let repo = LorebookRepository::new(store);
        repo.save_books(&[Lorebook::new("world")]).unwrap();

        let orphan = LorebookEntry::new("nowhere", "no parent book");
        let written = repo.upsert_many(&[orphan]).unwrap();
        assert_eq!(written, 0);
        assert!(repo.load().unwrap().is_empty());
    }

    #[test]
    fn test_memory_upsert_fans_out_by_shard() {
        let store = store();
        let repo = MemoryShardRepository::new(Arc::clone(&store));

        let global = MemoryRecord::new("global fact");
        let scoped = MemoryRecord::new("about Mira").for_character("c1");
        repo.upsert_many(&[global.clone(), scoped.clone()]).unwrap();

        assert_eq!(repo.load_shard("global_memories").unwrap().len(), 1);
        assert_eq!(repo.load_shard("memories_character_c1").unwrap().len(), 1);
        assert_eq!(repo.load().unwrap().len(), 2);
    }

    #[test]
    fn test_memory_upsert_leaves_untouched_shards_alone() {
        let store = store();
        let repo = MemoryShardRepository::new(Arc::clone(&store));

        // Seed a conversation shard out of band.
        let other = MemoryRecord::new("elsewhere").for_conversation("v1");
        save_array(store.as_ref(), "memories_conversation_v1", &[other.clone()]).unwrap();

        let mut scoped = MemoryRecord::new("about Mira").for_character("c1");
        scoped.embedding = vec![0.1];
        repo.upsert_many(std::slice::from_ref(&scoped)).unwrap();

        // The conversation shard is byte-identical to what was seeded.
        let untouched = repo.load_shard("memories_conversation_v1").unwrap();
        assert_eq!(untouched.len(), 1);
        assert_eq!(untouched[0].id, other.id);
        assert!(untouched[0].embedding.is_empty());
    }

    #[test]
    fn test_memory_upsert_by_id_within_shard() {
        let store = store();
        let repo = MemoryShardRepository::new(store);

        let mut record = MemoryRecord::new("v0");
        repo.upsert_many(std::slice::from_ref(&record)).unwrap();

        record.content = "v1".to_string();
        record.embedding = vec![0.2];
        repo.upsert_many(std::slice::from_ref(&record)).unwrap();

        let shard = repo.load_shard("global_memories").unwrap();
        assert_eq!(shard.len(), 1);
        assert_eq!(shard[0].content, "v1");
        assert_eq!(shard[0].scope, MemoryScope::Global);
    }
}

//! Key-value adapter over the chained engine.

use crate::chain_table::{ChainHandle, ChainTable, Iter};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

/// Hash map resolving collisions by separate chaining over one shared
/// record list. Inserting a present key is a soft reject: `(false,
/// handle-to-existing)`, never an error.
pub struct ChainedHashMap<K, V, S = RandomState> {
    table: ChainTable<K, V, S>,
}

impl<K, V> ChainedHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            table: ChainTable::new(),
        }
    }

    pub fn with_buckets(buckets: usize) -> Self {
        Self {
            table: ChainTable::with_buckets(buckets),
        }
    }
}

impl<K, V> Default for ChainedHashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ChainedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: ChainTable::with_hasher(hasher),
        }
    }

    pub fn with_config(buckets: usize, hasher: S) -> Self {
        Self {
            table: ChainTable::with_config(buckets, hasher),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    /// Returns `(newly_inserted, handle)`.
    pub fn insert(&mut self, key: K, value: V) -> (bool, ChainHandle) {
        self.table.insert(key, value)
    }

    pub fn find<Q>(&self, q: &Q) -> Option<ChainHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains_key(q)
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(q)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get_mut(q)
    }

    /// Remove by key, returning the value if the key was present.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(q).map(|(_, v)| v)
    }

    /// Remove by handle; stale handles yield `None`.
    pub fn remove_at(&mut self, handle: ChainHandle) -> Option<(K, V)> {
        self.table.remove_at(handle)
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn key_at(&self, handle: ChainHandle) -> Option<&K> {
        handle.key(&self.table)
    }

    pub fn value_at(&self, handle: ChainHandle) -> Option<&V> {
        handle.value(&self.table)
    }

    pub fn value_at_mut(&mut self, handle: ChainHandle) -> Option<&mut V> {
        handle.value_mut(&mut self.table)
    }

    /// Iterate `(handle, &key, &value)` front to back over the shared
    /// record list.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.table.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: the adapter forwards the engine's soft duplicate policy
    /// and size accounting.
    #[test]
    fn map_basics() {
        let mut m: ChainedHashMap<String, i32> = ChainedHashMap::new();
        let (new, _) = m.insert("a".to_string(), 1);
        assert!(new);
        let (new, h) = m.insert("a".to_string(), 9);
        assert!(!new);
        assert_eq!(m.value_at(h), Some(&1));
        assert_eq!(m.len(), 1);
        assert_eq!(m.remove("a"), Some(1));
        assert!(m.is_empty());
    }

    /// Invariant: `clear` empties the map and later inserts still work.
    #[test]
    fn clear_and_reuse() {
        let mut m: ChainedHashMap<u32, u32> = ChainedHashMap::new();
        for k in 0..5 {
            m.insert(k, k);
        }
        m.clear();
        assert!(m.is_empty());
        assert!(!m.contains_key(&3));
        m.insert(3, 33);
        assert_eq!(m.get(&3), Some(&33));
    }

    /// Invariant: handle accessors resolve through the adapter.
    #[test]
    fn handle_accessors() {
        let mut m: ChainedHashMap<String, i32> = ChainedHashMap::new();
        let (_, h) = m.insert("k".to_string(), 3);
        assert_eq!(m.key_at(h), Some(&"k".to_string()));
        *m.value_at_mut(h).unwrap() = 4;
        assert_eq!(m.value_at(h), Some(&4));
        m.remove_at(h).unwrap();
        assert_eq!(m.value_at(h), None);
    }
}

//! Key-only adapter over the open-addressing engine: the same table with a
//! unit value.

use crate::probe_table::{InsertError, Iter as TableIter, ProbeHandle, ProbeTable};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

/// Hash set resolving collisions by strided open addressing. Like the map
/// shape, adding a present key is a hard error.
pub struct ProbeHashSet<K, S = RandomState> {
    table: ProbeTable<K, (), S>,
}

impl<K> ProbeHashSet<K>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            table: ProbeTable::new(),
        }
    }

    pub fn with_capacity_and_stride(capacity: usize, stride: usize) -> Self {
        Self {
            table: ProbeTable::with_capacity_and_stride(capacity, stride),
        }
    }
}

impl<K> Default for ProbeHashSet<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over set members in ascending slot order.
pub struct Iter<'a, K> {
    inner: TableIter<'a, K, ()>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, k, _)| k)
    }
}

impl<K, S> ProbeHashSet<K, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: ProbeTable::with_hasher(hasher),
        }
    }

    pub fn with_config(capacity: usize, stride: usize, hasher: S) -> Self {
        Self {
            table: ProbeTable::with_config(capacity, stride, hasher),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn insert(&mut self, key: K) -> Result<ProbeHandle, InsertError> {
        self.table.insert(key, ())
    }

    pub fn find<Q>(&self, q: &Q) -> Option<ProbeHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(q)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains_key(q)
    }

    /// Remove by key; `true` if the key was a member.
    pub fn remove<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(q).is_some()
    }

    /// Remove by handle, returning the key; stale handles yield `None`.
    pub fn remove_at(&mut self, handle: ProbeHandle) -> Option<K> {
        self.table.remove_at(handle).map(|(k, ())| k)
    }

    pub fn key_at(&self, handle: ProbeHandle) -> Option<&K> {
        handle.key(&self.table)
    }

    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            inner: self.table.iter(),
        }
    }
}

//! ChainTable: separate-chaining engine over one shared record list.
//!
//! Every live record sits in a slotmap arena and is threaded into a single
//! doubly linked list by explicit key links. A bucket does not own its own
//! container; it owns a contiguous run of that list, described by an
//! anchor (the run's first record) and a chain length. New records enter a
//! non-empty chain immediately before the current anchor and become the
//! new anchor, so a chain walk is always `len` forward steps from the
//! anchor and runs never interleave.
//!
//! Handles are the arena's generational keys: removing a record, or
//! relocating it through a rehash, retires its key for good, so stale
//! handles are rejected instead of aliasing whatever lives there next.

use crate::guard::ActiveCall;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

pub(crate) const DEFAULT_BUCKETS: usize = 16;
const LOAD_FACTOR_THRESHOLD: f64 = 0.75;

#[derive(Debug)]
struct Record<K, V> {
    hash: u64,
    key: K,
    value: V,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

/// Anchor + length pair describing a bucket's contiguous run. `anchor` is
/// `None` exactly when `len` is 0.
#[derive(Copy, Clone, Debug, Default)]
struct BucketInfo {
    anchor: Option<DefaultKey>,
    len: usize,
}

/// Locator for a record in a [`ChainTable`]. Wraps a generational arena
/// key, so a handle whose record was removed or rehashed never resolves
/// again.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ChainHandle(DefaultKey);

impl ChainHandle {
    pub fn key<'a, K, V, S>(&self, table: &'a ChainTable<K, V, S>) -> Option<&'a K>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        table.handle_entry(*self).map(|(k, _)| k)
    }

    pub fn value<'a, K, V, S>(&self, table: &'a ChainTable<K, V, S>) -> Option<&'a V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        table.handle_entry(*self).map(|(_, v)| v)
    }

    pub fn value_mut<'a, K, V, S>(&self, table: &'a mut ChainTable<K, V, S>) -> Option<&'a mut V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        table.handle_value_mut(*self)
    }
}

/// Separate-chaining hash table with map semantics. Set shapes instantiate
/// it with `V = ()`.
///
/// Unlike the probing engine, inserting a present key is not an error: it
/// reports `(false, handle-to-existing)` and changes nothing.
pub struct ChainTable<K, V, S = RandomState> {
    hasher: S,
    records: SlotMap<DefaultKey, Record<K, V>>,
    /// Front of the global record list; iteration starts here.
    head: Option<DefaultKey>,
    buckets: Vec<BucketInfo>,
    active: ActiveCall,
}

impl<K, V> ChainTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// `buckets` may be 0; the default bucket count is then allocated
    /// lazily by the first insert.
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_config(buckets, RandomState::default())
    }
}

impl<K, V> Default for ChainTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the shared record list, front to back: bucket-major,
/// most recent insert first within each bucket's run.
pub struct Iter<'a, K, V> {
    records: &'a SlotMap<DefaultKey, Record<K, V>>,
    cur: Option<DefaultKey>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (ChainHandle, &'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cur?;
        let rec = self.records.get(k)?;
        self.cur = rec.next;
        Some((ChainHandle(k), &rec.key, &rec.value))
    }
}

impl<K, V, S> ChainTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_config(DEFAULT_BUCKETS, hasher)
    }

    pub fn with_config(buckets: usize, hasher: S) -> Self {
        let mut bucket_vec = Vec::new();
        bucket_vec.resize_with(buckets, BucketInfo::default);
        Self {
            hasher,
            records: SlotMap::with_key(),
            head: None,
            buckets: bucket_vec,
            active: ActiveCall::new(),
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    fn load_exceeded(&self) -> bool {
        self.records.len() as f64 / self.buckets.len() as f64 > LOAD_FACTOR_THRESHOLD
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Insert a key, or report the existing record. Returns
    /// `(newly_inserted, handle)`; on `false` the table is unchanged and
    /// the handle addresses the record already holding the key.
    ///
    /// Crossing the load factor after a successful insert doubles the
    /// bucket count and rebuilds every chain; the returned handle is
    /// re-resolved across that rebuild, so it is always live. All handles
    /// issued earlier are invalidated by the rebuild.
    pub fn insert(&mut self, key: K, value: V) -> (bool, ChainHandle) {
        let _t = self.active.begin();
        if self.buckets.is_empty() {
            self.buckets.resize_with(DEFAULT_BUCKETS, BucketInfo::default);
        }

        let hash = self.make_hash(&key);
        let b = self.bucket_of(hash);
        if let Some(existing) = self.chain_lookup(b, hash, &key) {
            return (false, ChainHandle(existing));
        }

        let k = self.place(hash, key, value);
        if self.load_exceeded() {
            let k = self.rehash(self.buckets.len() * 2, k);
            return (true, ChainHandle(k));
        }
        (true, ChainHandle(k))
    }

    pub fn find<Q>(&self, q: &Q) -> Option<ChainHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _t = self.active.begin();
        self.lookup(q).map(ChainHandle)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _t = self.active.begin();
        self.lookup(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _t = self.active.begin();
        let k = self.lookup(q)?;
        Some(&self.records[k].value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _t = self.active.begin();
        let k = self.lookup(q)?;
        Some(&mut self.records[k].value)
    }

    /// Remove by key. If the record was its bucket's anchor the anchor
    /// advances to the record's list successor first, keeping the rest of
    /// the run reachable.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _t = self.active.begin();
        if self.buckets.is_empty() {
            return None;
        }
        let hash = self.make_hash(q);
        let b = self.bucket_of(hash);
        let k = self.chain_lookup(b, hash, q)?;
        Some(self.remove_record(k, b))
    }

    /// Remove by handle; stale handles yield `None`. The owning bucket is
    /// derived from the record's stored hash.
    pub fn remove_at(&mut self, handle: ChainHandle) -> Option<(K, V)> {
        let _t = self.active.begin();
        let hash = self.records.get(handle.0)?.hash;
        let b = self.bucket_of(hash);
        Some(self.remove_record(handle.0, b))
    }

    /// Drop every record and the bucket array itself; the bucket count
    /// returns to the default on the next insert.
    pub fn clear(&mut self) {
        let _t = self.active.begin();
        self.records.clear();
        self.head = None;
        self.buckets.clear();
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            records: &self.records,
            cur: self.head,
        }
    }

    pub(crate) fn handle_entry(&self, h: ChainHandle) -> Option<(&K, &V)> {
        let _t = self.active.begin();
        self.records.get(h.0).map(|r| (&r.key, &r.value))
    }

    pub(crate) fn handle_value_mut(&mut self, h: ChainHandle) -> Option<&mut V> {
        let _t = self.active.begin();
        self.records.get_mut(h.0).map(|r| &mut r.value)
    }

    fn lookup<Q>(&self, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if self.buckets.is_empty() {
            return None;
        }
        let hash = self.make_hash(q);
        self.chain_lookup(self.bucket_of(hash), hash, q)
    }

    /// Walk exactly `len` records forward from the bucket's anchor.
    fn chain_lookup<Q>(&self, b: usize, hash: u64, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let info = self.buckets[b];
        let mut cur = info.anchor;
        for _ in 0..info.len {
            let k = cur?;
            let rec = &self.records[k];
            if rec.hash == hash && rec.key.borrow() == q {
                return Some(k);
            }
            cur = rec.next;
        }
        None
    }

    /// Link a new record into its bucket's run and move the anchor to it.
    fn place(&mut self, hash: u64, key: K, value: V) -> DefaultKey {
        let b = self.bucket_of(hash);
        let rec = Record {
            hash,
            key,
            value,
            prev: None,
            next: None,
        };
        let k = match self.buckets[b].anchor {
            Some(anchor) => self.link_before(anchor, rec),
            None => self.link_front(rec),
        };
        self.buckets[b].anchor = Some(k);
        self.buckets[b].len += 1;
        k
    }

    fn link_front(&mut self, mut rec: Record<K, V>) -> DefaultKey {
        rec.prev = None;
        rec.next = self.head;
        let k = self.records.insert(rec);
        if let Some(old) = self.head {
            self.records[old].prev = Some(k);
        }
        self.head = Some(k);
        k
    }

    fn link_before(&mut self, pos: DefaultKey, mut rec: Record<K, V>) -> DefaultKey {
        let before = self.records[pos].prev;
        rec.prev = before;
        rec.next = Some(pos);
        let k = self.records.insert(rec);
        match before {
            Some(p) => self.records[p].next = Some(k),
            None => self.head = Some(k),
        }
        self.records[pos].prev = Some(k);
        k
    }

    /// Unlink a record from the list and free its arena slot.
    fn detach(&mut self, k: DefaultKey) -> Record<K, V> {
        let rec = self.records.remove(k).expect("detach of a live record");
        match rec.prev {
            Some(p) => self.records[p].next = rec.next,
            None => self.head = rec.next,
        }
        if let Some(n) = rec.next {
            self.records[n].prev = rec.prev;
        }
        rec
    }

    fn remove_record(&mut self, k: DefaultKey, b: usize) -> (K, V) {
        if self.buckets[b].anchor == Some(k) {
            // head-of-run removal: the successor (same run, by contiguity)
            // becomes the anchor, or the run empties
            let next = self.records[k].next;
            self.buckets[b].anchor = if self.buckets[b].len > 1 { next } else { None };
        }
        let rec = self.detach(k);
        self.buckets[b].len -= 1;
        (rec.key, rec.value)
    }

    /// Rebuild with `new_count` buckets: drain the list front to back,
    /// then re-place every record through the normal path. Every arena key
    /// is reissued, which is what retires all outstanding handles. `track`
    /// names one drained record whose reissued key is returned.
    fn rehash(&mut self, new_count: usize, track: DefaultKey) -> DefaultKey {
        let mut moved = Vec::with_capacity(self.records.len());
        let mut track_idx = None;
        while let Some(k) = self.head {
            if k == track {
                track_idx = Some(moved.len());
            }
            let rec = self.detach(k);
            moved.push((rec.hash, rec.key, rec.value));
        }
        debug_assert!(self.records.is_empty());

        self.buckets.clear();
        self.buckets.resize_with(new_count, BucketInfo::default);

        let mut tracked = track;
        for (i, (hash, key, value)) in moved.into_iter().enumerate() {
            let k = self.place(hash, key, value);
            if track_idx == Some(i) {
                tracked = k;
            }
        }
        tracked
    }

    /// Structural self-check used by tests: list links are consistent, the
    /// list covers the arena, every bucket's declared run is contiguous,
    /// hashes to that bucket, and holds no duplicate key.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let mut walked = 0;
        let mut prev = None;
        let mut cur = self.head;
        while let Some(k) = cur {
            let rec = &self.records[k];
            assert_eq!(rec.prev, prev, "prev link mismatch");
            walked += 1;
            assert!(walked <= self.records.len(), "cycle in record list");
            prev = Some(k);
            cur = rec.next;
        }
        assert_eq!(walked, self.records.len(), "list must cover the arena");

        let mut total = 0;
        let mut seen = std::collections::HashSet::new();
        for (b, info) in self.buckets.iter().enumerate() {
            assert_eq!(info.anchor.is_none(), info.len == 0);
            let mut run_keys: Vec<&K> = Vec::with_capacity(info.len);
            let mut cur = info.anchor;
            for _ in 0..info.len {
                let k = cur.expect("run shorter than its declared length");
                let rec = &self.records[k];
                assert_eq!(self.bucket_of(rec.hash), b, "record in wrong run");
                assert!(seen.insert(k), "record claimed by two runs");
                run_keys.push(&rec.key);
                cur = rec.next;
            }
            for i in 0..run_keys.len() {
                for j in i + 1..run_keys.len() {
                    assert!(run_keys[i] != run_keys[j], "duplicate key in run");
                }
            }
            total += info.len;
        }
        assert_eq!(total, self.records.len(), "run lengths must sum to len");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hasher;

    #[derive(Clone, Default)]
    struct IdentityBuild;
    struct IdentityHasher(u64);

    impl BuildHasher for IdentityBuild {
        type Hasher = IdentityHasher;
        fn build_hasher(&self) -> IdentityHasher {
            IdentityHasher(0)
        }
    }

    impl Hasher for IdentityHasher {
        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | u64::from(b);
            }
        }
        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
        fn finish(&self) -> u64 {
            self.0
        }
    }

    fn identity_table() -> ChainTable<u64, &'static str, IdentityBuild> {
        ChainTable::with_config(DEFAULT_BUCKETS, IdentityBuild)
    }

    /// Invariant: a freshly inserted key round-trips through `find`/`get`.
    #[test]
    fn round_trip_insert_find() {
        let mut t: ChainTable<String, i32> = ChainTable::new();
        let (new, h) = t.insert("a".to_string(), 1);
        assert!(new);
        assert_eq!(h.value(&t), Some(&1));
        assert_eq!(t.get("a"), Some(&1));
        assert_eq!(t.get("b"), None);
        assert_eq!(t.len(), 1);
    }

    /// Invariant: inserting a present key is a soft reject: `(false,
    /// handle-to-existing)`, size and value unchanged.
    #[test]
    fn insert_existing_reports_not_inserted() {
        let mut t: ChainTable<String, i32> = ChainTable::new();
        let (_, h1) = t.insert("k".to_string(), 1);
        let (new, h2) = t.insert("k".to_string(), 99);
        assert!(!new);
        assert_eq!(h1, h2, "handle must address the existing record");
        assert_eq!(t.len(), 1);
        assert_eq!(t.get("k"), Some(&1), "value must not be overwritten");
        t.check_invariants();
    }

    /// Invariant: iteration is bucket-major and most-recent-first within a
    /// run. Keys 1, 17, 33 share bucket 1 (mod 16) and stack in front of
    /// the run's anchor; key 2 opens a new run at the list front.
    #[test]
    fn iteration_order_tracks_anchor_prepends() {
        let mut t = identity_table();
        t.insert(1, "a");
        t.insert(17, "b");
        t.insert(33, "c");
        t.insert(2, "d");
        let keys: Vec<u64> = t.iter().map(|(_, k, _)| *k).collect();
        assert_eq!(keys, vec![2, 33, 17, 1]);
        t.check_invariants();
    }

    /// Invariant: removing the run's anchor advances the anchor to its
    /// list successor and leaves the rest of the run reachable.
    #[test]
    fn remove_anchor_advances() {
        let mut t = identity_table();
        t.insert(1, "a");
        t.insert(17, "b");
        t.insert(33, "c");
        assert_eq!(t.remove(&33), Some((33, "c")));
        t.check_invariants();
        assert_eq!(t.get(&17), Some(&"b"));
        assert_eq!(t.get(&1), Some(&"a"));
        let keys: Vec<u64> = t.iter().map(|(_, k, _)| *k).collect();
        assert_eq!(keys, vec![17, 1]);
    }

    /// Invariant: removing a mid-run or last-of-run record keeps the run
    /// contiguous; an emptied run drops its anchor.
    #[test]
    fn remove_middle_and_last_of_run() {
        let mut t = identity_table();
        t.insert(1, "a");
        t.insert(17, "b");
        t.insert(33, "c");
        t.insert(2, "d");

        assert_eq!(t.remove(&17), Some((17, "b")));
        t.check_invariants();
        assert_eq!(t.get(&33), Some(&"c"));
        assert_eq!(t.get(&1), Some(&"a"));

        assert_eq!(t.remove(&2), Some((2, "d")));
        t.check_invariants();
        assert_eq!(t.get(&2), None);
        assert_eq!(t.len(), 2);
    }

    /// Invariant: removal of an absent key is `None` and changes nothing.
    #[test]
    fn remove_absent_is_noop() {
        let mut t: ChainTable<String, i32> = ChainTable::new();
        t.insert("a".to_string(), 1);
        assert_eq!(t.remove("zzz"), None);
        assert_eq!(t.len(), 1);
        t.check_invariants();
    }

    /// Invariant: crossing the load factor doubles the bucket count,
    /// keeps every key findable, invalidates earlier handles, and the
    /// triggering insert's handle survives re-resolution.
    #[test]
    fn rehash_doubles_buckets_and_retires_handles() {
        let mut t: ChainTable<u64, u64, IdentityBuild> =
            ChainTable::with_config(DEFAULT_BUCKETS, IdentityBuild);
        let (_, early) = t.insert(0, 0);
        for k in 1..12 {
            t.insert(k, k * 10);
        }
        assert_eq!(t.bucket_count(), DEFAULT_BUCKETS, "12/16 does not cross 0.75");

        let (new, h) = t.insert(12, 120);
        assert!(new);
        assert_eq!(t.bucket_count(), DEFAULT_BUCKETS * 2, "13/16 crosses 0.75");
        assert_eq!(h.value(&t), Some(&120), "triggering handle is re-resolved");
        assert_eq!(early.value(&t), None, "pre-rehash handle is retired");
        for k in 0..12 {
            assert_eq!(t.get(&k), Some(&(k * 10)));
        }
        t.check_invariants();
    }

    /// Invariant: `clear` drops records and buckets; the next insert
    /// lazily re-allocates the default bucket count.
    #[test]
    fn clear_then_lazy_reallocation() {
        let mut t: ChainTable<String, i32> = ChainTable::new();
        t.insert("a".to_string(), 1);
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.bucket_count(), 0);
        assert_eq!(t.find("a"), None);
        assert_eq!(t.remove("a"), None);

        let (new, _) = t.insert("b".to_string(), 2);
        assert!(new);
        assert_eq!(t.bucket_count(), DEFAULT_BUCKETS);
        assert_eq!(t.get("b"), Some(&2));
        t.check_invariants();
    }

    /// Invariant: a table built with zero buckets allocates them on the
    /// first insert.
    #[test]
    fn zero_buckets_allocated_lazily() {
        let mut t: ChainTable<u64, u64> = ChainTable::with_buckets(0);
        assert_eq!(t.find(&1), None);
        t.insert(1, 10);
        assert_eq!(t.bucket_count(), DEFAULT_BUCKETS);
        assert_eq!(t.get(&1), Some(&10));
    }

    /// Invariant: a removed record's handle never aliases a later record,
    /// even when the same key is reinserted into a reused slot.
    #[test]
    fn stale_handle_does_not_alias_reinserted_key() {
        let mut t: ChainTable<String, i32> = ChainTable::new();
        let (_, h1) = t.insert("k".to_string(), 1);
        assert_eq!(t.remove("k"), Some(("k".to_string(), 1)));
        assert_eq!(h1.value(&t), None);

        let (_, h2) = t.insert("k".to_string(), 2);
        assert_ne!(h1, h2, "generations must differ");
        assert_eq!(h1.value(&t), None, "stale handle stays dead");
        assert_eq!(h2.value(&t), Some(&2));
    }

    /// Invariant: `remove_at` removes exactly the addressed record; a
    /// stale handle is rejected.
    #[test]
    fn remove_at_by_handle() {
        let mut t = identity_table();
        let (_, h) = t.insert(1, "a");
        t.insert(17, "b");
        assert_eq!(t.remove_at(h), Some((1, "a")));
        assert_eq!(t.remove_at(h), None);
        assert_eq!(t.get(&17), Some(&"b"));
        t.check_invariants();
    }

    /// Invariant: handle accessors read and mutate the addressed record.
    #[test]
    fn handle_access_and_mutation() {
        let mut t: ChainTable<String, i32> = ChainTable::new();
        let (_, h) = t.insert("k1".to_string(), 10);
        assert_eq!(h.key(&t), Some(&"k1".to_string()));
        *h.value_mut(&mut t).unwrap() += 5;
        assert_eq!(t.get("k1"), Some(&15));
    }

    /// Invariant: borrowed lookups work (store `String`, query `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut t: ChainTable<String, i32> = ChainTable::new();
        t.insert("hello".to_string(), 1);
        assert!(t.contains_key("hello"));
        assert!(!t.contains_key("world"));
    }
}

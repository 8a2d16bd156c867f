//! ProbeTable: open-addressing engine with a fixed probe stride and
//! tombstone deletion.
//!
//! All entries live directly in one slot array. A lookup starts at
//! `hash % capacity` and advances by a fixed step until it hits the key,
//! an empty slot, or a full cycle. Deletion writes a tombstone instead of
//! emptying the slot so that probe chains through it stay connected;
//! tombstones are reclaimed when a growth rehash rebuilds the array.
//!
//! The configured stride is not required to be coprime to the capacity.
//! The table therefore derives an effective step (the smallest value at or
//! above the stride that is coprime to the current capacity) at
//! construction and again after every resize, so a probe cycle always
//! visits every slot.

use crate::guard::ActiveCall;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::mem;
use std::collections::hash_map::RandomState;

pub(crate) const DEFAULT_CAPACITY: usize = 10;
pub(crate) const DEFAULT_STRIDE: usize = 3;
const MAX_LOAD_FACTOR: f64 = 0.8;

/// Slot states. `Occupied` keeps the precomputed hash so rehashing never
/// re-invokes `K: Hash`.
#[derive(Debug)]
enum Slot<K, V> {
    Empty,
    Occupied { hash: u64, key: K, value: V },
    Tombstone,
}

impl<K, V> Slot<K, V> {
    fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied { .. })
    }
}

fn empty_slots<K, V>(n: usize) -> Vec<Slot<K, V>> {
    let mut slots = Vec::new();
    slots.resize_with(n, || Slot::Empty);
    slots
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Smallest step >= `stride` (and >= 1) that is coprime to `capacity`.
fn coprime_step(stride: usize, capacity: usize) -> usize {
    let mut step = stride.max(1);
    while gcd(step, capacity) != 1 {
        step += 1;
    }
    step
}

/// Locator for an entry in a [`ProbeTable`]: a slot index tagged with the
/// epoch of the table that issued it. Any rehash bumps the table's epoch,
/// so handles issued before a resize are detected and rejected instead of
/// resolving into relocated storage.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ProbeHandle {
    slot: usize,
    epoch: u32,
}

impl ProbeHandle {
    pub fn key<'a, K, V, S>(&self, table: &'a ProbeTable<K, V, S>) -> Option<&'a K>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        table.handle_entry(*self).map(|(k, _)| k)
    }

    pub fn value<'a, K, V, S>(&self, table: &'a ProbeTable<K, V, S>) -> Option<&'a V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        table.handle_entry(*self).map(|(_, v)| v)
    }

    pub fn value_mut<'a, K, V, S>(&self, table: &'a mut ProbeTable<K, V, S>) -> Option<&'a mut V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        table.handle_value_mut(*self)
    }
}

/// Error returned by [`ProbeTable::insert`] when the key is already
/// present. This engine treats a duplicate as a hard failure; it never
/// overwrites in place.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertError {
    DuplicateKey,
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::DuplicateKey => f.write_str("key already present"),
        }
    }
}

impl std::error::Error for InsertError {}

/// Open-addressing hash table with map semantics. Set shapes instantiate
/// it with `V = ()`.
pub struct ProbeTable<K, V, S = RandomState> {
    hasher: S,
    slots: Vec<Slot<K, V>>,
    live: usize,
    /// Requested probe stride; kept so resizes re-derive the step from the
    /// caller's configuration rather than from a previous adjustment.
    stride: usize,
    /// Effective step, coprime to `slots.len()`.
    step: usize,
    /// Bumped on every rehash; handles from older epochs never resolve.
    epoch: u32,
    active: ActiveCall,
}

impl<K, V> ProbeTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_capacity_and_stride(DEFAULT_CAPACITY, DEFAULT_STRIDE)
    }

    pub fn with_capacity_and_stride(capacity: usize, stride: usize) -> Self {
        Self::with_config(capacity, stride, RandomState::default())
    }
}

impl<K, V> Default for ProbeTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over immutable entries in slot order.
pub struct Iter<'a, K, V> {
    slots: core::iter::Enumerate<core::slice::Iter<'a, Slot<K, V>>>,
    epoch: u32,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (ProbeHandle, &'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (i, slot) = self.slots.next()?;
            if let Slot::Occupied { key, value, .. } = slot {
                let handle = ProbeHandle {
                    slot: i,
                    epoch: self.epoch,
                };
                return Some((handle, key, value));
            }
        }
    }
}

/// Iterator over entries with mutable values, in slot order.
pub struct IterMut<'a, K, V> {
    slots: core::iter::Enumerate<core::slice::IterMut<'a, Slot<K, V>>>,
    epoch: u32,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (ProbeHandle, &'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (i, slot) = self.slots.next()?;
            if let Slot::Occupied { key, value, .. } = slot {
                let handle = ProbeHandle {
                    slot: i,
                    epoch: self.epoch,
                };
                return Some((handle, &*key, value));
            }
        }
    }
}

impl<K, V, S> ProbeTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_config(DEFAULT_CAPACITY, DEFAULT_STRIDE, hasher)
    }

    pub fn with_config(capacity: usize, stride: usize, hasher: S) -> Self {
        let capacity = capacity.max(1);
        Self {
            hasher,
            slots: empty_slots(capacity),
            live: 0,
            stride,
            step: coprime_step(stride, capacity),
            epoch: 0,
            active: ActiveCall::new(),
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    fn home(&self, hash: u64) -> usize {
        (hash % self.slots.len() as u64) as usize
    }

    fn next_slot(&self, i: usize) -> usize {
        (i + self.step) % self.slots.len()
    }

    fn load_exceeded(&self) -> bool {
        self.live as f64 / self.slots.len() as f64 > MAX_LOAD_FACTOR
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Insert a new key. The load factor is checked (strictly) before
    /// placement; crossing it doubles the capacity first, which discards
    /// all tombstones and invalidates previously issued handles.
    ///
    /// A key equal to one already reachable on its probe path fails with
    /// [`InsertError::DuplicateKey`] and leaves the table unchanged. The
    /// scan stops at the first non-occupied slot, so the entry lands in
    /// the first empty or tombstoned slot on its path.
    pub fn insert(&mut self, key: K, value: V) -> Result<ProbeHandle, InsertError> {
        let _t = self.active.begin();
        if self.load_exceeded() {
            self.rebuild(self.slots.len() * 2);
        }

        let hash = self.make_hash(&key);
        let mut i = self.home(hash);
        while let Slot::Occupied {
            hash: h,
            key: existing,
            ..
        } = &self.slots[i]
        {
            if *h == hash && *existing == key {
                return Err(InsertError::DuplicateKey);
            }
            i = self.next_slot(i);
        }

        self.slots[i] = Slot::Occupied { hash, key, value };
        self.live += 1;
        Ok(ProbeHandle {
            slot: i,
            epoch: self.epoch,
        })
    }

    /// Probe for a key. Tombstones are stepped over; a never-written slot
    /// or a full probe cycle terminates the search. The full-cycle exit is
    /// reachable once every slot is occupied or tombstoned.
    pub fn find<Q>(&self, q: &Q) -> Option<ProbeHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _t = self.active.begin();
        self.find_slot(q).map(|i| ProbeHandle {
            slot: i,
            epoch: self.epoch,
        })
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _t = self.active.begin();
        self.find_slot(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _t = self.active.begin();
        let i = self.find_slot(q)?;
        match &self.slots[i] {
            Slot::Occupied { value, .. } => Some(value),
            _ => unreachable!("find_slot returns occupied slots"),
        }
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _t = self.active.begin();
        let i = self.find_slot(q)?;
        match &mut self.slots[i] {
            Slot::Occupied { value, .. } => Some(value),
            _ => unreachable!("find_slot returns occupied slots"),
        }
    }

    /// Remove by key. The slot becomes a tombstone, not empty, so probe
    /// chains that were displaced past it keep resolving. Handles of other
    /// entries stay valid.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _t = self.active.begin();
        let i = self.find_slot(q)?;
        self.take_slot(i)
    }

    /// Remove by handle. Stale handles (older epoch, or a slot no longer
    /// occupied) are rejected with `None`.
    pub fn remove_at(&mut self, handle: ProbeHandle) -> Option<(K, V)> {
        let _t = self.active.begin();
        if handle.epoch != self.epoch || handle.slot >= self.slots.len() {
            return None;
        }
        self.take_slot(handle.slot)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter().enumerate(),
            epoch: self.epoch,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            slots: self.slots.iter_mut().enumerate(),
            epoch: self.epoch,
        }
    }

    pub(crate) fn handle_entry(&self, h: ProbeHandle) -> Option<(&K, &V)> {
        let _t = self.active.begin();
        if h.epoch != self.epoch || h.slot >= self.slots.len() {
            return None;
        }
        match &self.slots[h.slot] {
            Slot::Occupied { key, value, .. } => Some((key, value)),
            _ => None,
        }
    }

    pub(crate) fn handle_value_mut(&mut self, h: ProbeHandle) -> Option<&mut V> {
        let _t = self.active.begin();
        if h.epoch != self.epoch || h.slot >= self.slots.len() {
            return None;
        }
        match &mut self.slots[h.slot] {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    fn find_slot<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let start = self.home(hash);
        let mut i = start;
        loop {
            match &self.slots[i] {
                Slot::Empty => return None,
                Slot::Occupied { hash: h, key, .. } if *h == hash && key.borrow() == q => {
                    return Some(i)
                }
                _ => {}
            }
            i = self.next_slot(i);
            if i == start {
                return None;
            }
        }
    }

    fn take_slot(&mut self, i: usize) -> Option<(K, V)> {
        match mem::replace(&mut self.slots[i], Slot::Tombstone) {
            Slot::Occupied { key, value, .. } => {
                self.live -= 1;
                Some((key, value))
            }
            other => {
                // remove_at aimed at a non-occupied slot; put the original
                // state back so a tombstone is not minted out of thin air
                self.slots[i] = other;
                None
            }
        }
    }

    /// Full rehash into `new_capacity` all-empty slots using the stored
    /// hashes. Tombstones are dropped and the epoch is bumped.
    fn rebuild(&mut self, new_capacity: usize) {
        let old = mem::replace(&mut self.slots, empty_slots(new_capacity));
        self.step = coprime_step(self.stride, new_capacity);
        self.epoch = self.epoch.wrapping_add(1);
        self.live = 0;
        for slot in old {
            if let Slot::Occupied { hash, key, value } = slot {
                self.place(hash, key, value);
            }
        }
    }

    // Placement without the duplicate scan; keys are unique here.
    fn place(&mut self, hash: u64, key: K, value: V) {
        let mut i = self.home(hash);
        while self.slots[i].is_occupied() {
            i = self.next_slot(i);
        }
        self.slots[i] = Slot::Occupied { hash, key, value };
        self.live += 1;
    }
}

//! dual-hashmap: single-threaded, handle-based hash maps and sets with
//! two interchangeable collision engines.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: implement both classic collision-resolution strategies in safe,
//!   verifiable layers so each engine can be reasoned about independently.
//! - Engines:
//!   - ProbeTable<K, V, S>: open addressing over a flat slot array. Probes
//!     advance by a fixed stride; deletion writes a tombstone so probe
//!     chains stay connected; growth doubles capacity and discards
//!     tombstones. Handles are (slot, epoch) pairs and stop resolving
//!     after any rehash.
//!   - ChainTable<K, V, S>: separate chaining over one shared record list.
//!     Records live in a slotmap arena and are threaded into a single
//!     doubly linked list; each bucket owns a contiguous run described by
//!     an anchor record plus a chain length. Handles are generational
//!     arena keys and stop resolving once their record is removed or
//!     relocated by a rehash.
//! - Adapters:
//!   - ProbeHashMap / ChainedHashMap: key-value shapes over the engines.
//!   - ProbeHashSet / ChainedHashSet: key-only shapes, instantiating the
//!     same engines with a unit value.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` by design (no atomics, no locking).
//!   Concurrent mutation is a precondition violation, not a guarantee.
//! - Stable, checkable handles: a handle issued before a rehash must be
//!   rejected afterwards, never dereferenced into relocated storage.
//! - Duplicate keys: the probing engine rejects them with a hard
//!   `InsertError::DuplicateKey`; the chained engine reports
//!   `(false, handle-to-existing)` and changes nothing. The asymmetry is
//!   deliberate and kept.
//! - Reentrancy: disallowed during engine critical sections (only
//!   `K: Eq/Hash` may run there); enforced by a debug-only guard.
//!
//! Why this split?
//! - Localize invariants: probe-chain connectivity and chain contiguity
//!   are each confined to one file with their own tests.
//! - Minimize cleverness: structural indexing is safe Rust throughout;
//!   the chained engine's links are arena keys, never raw pointers.
//! - Thin adapters: map and set variants share every algorithm, so the
//!   collision logic exists exactly once per engine.
//!
//! Hasher and rehashing invariants
//! - Each entry stores a precomputed `u64` hash and rehashing always uses
//!   the stored hash; `K: Hash` is never invoked after insertion. Probing
//!   and chain walks compare stored hashes before calling `K: Eq`.
//!
//! Notes and non-goals
//! - Iteration order is an implementation artifact, not a contract: the
//!   probing engine iterates in slot order, the chained engine walks its
//!   record list front to back (bucket-major, most recent insert first
//!   within a bucket's run).
//! - No thread safety, no persistence, no rehash policy other than
//!   doubling. Capacity never shrinks.

mod chain_map;
mod chain_set;
pub mod chain_table;
mod chain_table_proptest;
mod guard;
mod probe_map;
mod probe_set;
pub mod probe_table;
mod probe_table_proptest;

// Public surface
pub use chain_map::ChainedHashMap;
pub use chain_set::ChainedHashSet;
pub use chain_table::ChainHandle;
pub use probe_map::ProbeHashMap;
pub use probe_set::ProbeHashSet;
pub use probe_table::{InsertError, ProbeHandle};

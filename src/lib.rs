//! chain-hashmap: a single-threaded hash map using separate chaining, with
//! cursor-style positions and a load-factor driven resize policy.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a small, predictable associative container whose iteration and
//!   resize behavior is fully specified, including when positions into it
//!   stay valid.
//! - Layers:
//!   - `policy`: the grow/shrink thresholds as pure functions over
//!     (count, capacity).
//!   - `BucketStore<K, V>`: bucket array of linked chains over a
//!     generational node arena; owns insert/lookup/remove and rehashing.
//!   - `cursor`: the traversal rule shared by `Cursor` and the borrowing
//!     and owning iterators.
//!   - `ChainHashMap<K, V, S>`: public API; hashes keys with `S` and
//!     delegates to the store.
//!
//! Constraints
//! - Capacity (bucket count) is never zero.
//! - Keys are unique; inserting a present key is a no-op and the first
//!   value stays until the key is removed.
//! - Iteration order is bucket index, then insertion order within a
//!   bucket. It is not sorted and a resize may change it.
//! - Single-threaded: no locking. The map is `Send` when `K`, `V` and `S`
//!   are, and never `Sync`.
//!
//! Resize policy
//! - After an insert: if `len * 2 > capacity`, double the bucket count.
//! - After a remove that leaves entries: if `capacity > 4 * len`, halve it.
//!   The gap between the two thresholds keeps alternating insert/remove
//!   from rehashing on every call.
//! - After a remove that leaves no entries: reset to the base capacity (10)
//!   regardless of the current size.
//! - Each entry caches its `u64` hash; rehashing never calls `K: Hash`.
//!
//! Cursor validity
//! - `Cursor` is a `Copy` handle of (bucket, entry, epoch) and borrows
//!   nothing, so misuse is detected at runtime rather than prevented.
//! - An insert that does not resize leaves every cursor valid, including
//!   `end()` and cursors into the bucket that received the entry.
//! - Any resize, `clear`, or removal of the last entry invalidates every
//!   cursor ([`MapError::StaleCursor`]).
//! - Removing an entry invalidates only cursors at that entry, unless the
//!   removal also resized.
//! - The borrowing iterators (`iter`, `iter_mut`, ...) need no checks: the
//!   borrow checker rules out mutation while they are alive.
//!
//! Reentrancy
//! - Chain probing calls user `K: Eq`. Debug builds panic if that code
//!   re-enters the same map; release builds do not check.
//!
//! Non-goals
//! - Thread safety, defence against adversarial collisions, custom
//!   allocators, serialization, sorted iteration, and cursors that survive
//!   a resize.

mod bucket_store;
mod chain_hash_map;
mod chain_hash_map_proptest;
pub mod cursor;
mod error;
pub mod policy;
mod reentrancy;

// Public surface
pub use chain_hash_map::ChainHashMap;
pub use cursor::Cursor;
pub use error::MapError;

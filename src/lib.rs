//! lru-hashmap: a fixed-capacity, thread-safe hash map that evicts the
//! least-recently-used entry once capacity is exceeded.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a bounded cache whose storage, hashing, collision handling, and
//!   recency tracking are all explicit, with no reliance on the ordering
//!   guarantees of a host collection.
//! - Layers:
//!   - ChainTable<K, V, S>: structural layer. A fixed array of buckets, each
//!     the head of a singly-linked chain of nodes living in an arena. Nodes
//!     cache their key hash. Appends at the chain tail; unlinks with a
//!     known predecessor.
//!   - LruTable<K, V, S>: adds capacity, a logical recency clock, promoting
//!     and non-promoting lookups, and the eviction scan. `&mut self` API,
//!     usable on its own by single-threaded callers.
//!   - LruHashMap<K, V, S>: public thread-safe map. One mutex per instance
//!     guards the whole table; an optional value factory backs
//!     `get_or_create` and `get_or_create_or_recycle`.
//!   - ShardedLruHashMap<K, V, S>: N independently locked maps routed by the
//!     high bits of the key hash, for callers that trade exact global LRU
//!     order for less contention.
//!
//! Constraints
//! - `capacity > 1`; `len <= capacity` after every completed operation.
//! - `bucket_count = floor(capacity / load_factor)`, at least 1, fixed for
//!   the map's lifetime. There is no rehashing.
//! - Recency stamps come from one `i64` clock per table, starting at
//!   `i64::MIN` and incremented on every insert, update, and promoting read.
//!   Stamps are unique, so the eviction victim is unique.
//! - Eviction scans every bucket and chain: O(len) per evicting insert, in
//!   exchange for no auxiliary ordering structure.
//!
//! Locking
//! - Coarse-grained: every `LruHashMap` operation, reads included, takes the
//!   same `parking_lot::Mutex`. Operations are linearizable and the lock
//!   acquisition order determines stamping and therefore eviction.
//! - The value factory runs under the lock. It must not re-enter the map; a
//!   debug-only guard turns that deadlock into a panic.
//! - A panicking factory leaves the map unchanged: the factory runs before
//!   any structural mutation. `parking_lot` mutexes do not poison.
//!
//! Hasher invariants
//! - Each node stores its `u64` hash; chains compare the stored hash before
//!   calling `K: Eq`. Bucket index is `hash % bucket_count` on the unsigned
//!   hash.
//!
//! Notes and non-goals
//! - No persistence, no distribution, no time-based expiry.
//! - Snapshots (`keys`, `values`, `entries`) are owned copies in unspecified
//!   order, never live views.
//! - Value recycling (`get_or_create_or_recycle`) moves the evicted value
//!   under the new key; with `V = Arc<T>` callers observe the same pointer.

mod builder;
mod chain_table;
mod error;
mod lru_hash_map;
pub mod lru_table;
#[cfg(test)]
mod lru_table_proptest;
mod reentrancy;
mod sharded;

// Public surface
pub use builder::Builder;
pub use error::{Error, Result};
pub use lru_hash_map::{LruHashMap, ValueFactory};
pub use lru_table::{LruTable, DEFAULT_LOAD_FACTOR};
pub use sharded::ShardedLruHashMap;

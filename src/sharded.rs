//! ShardedLruHashMap: N independently locked `LruHashMap` shards.
//!
//! A key is routed by its hash with the high and low halves folded together,
//! so hashers that only fill the low bits still spread keys; inside a shard
//! the bucket index uses the remainder of the full hash. Threads touching different
//! shards never contend.
//!
//! Recency is per shard. Eviction removes the oldest entry *of the shard that
//! overflowed*, so the map as a whole is only approximately LRU, and each
//! shard enforces its own slice of the capacity. Aggregates (`len`, `keys`,
//! ...) visit shards one at a time and are not a single atomic snapshot.

use crate::builder::Builder;
use crate::error::{Error, Result};
use crate::lru_hash_map::{LruHashMap, ValueFactory};
use crate::lru_table::LruTable;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;
use tracing::debug;

pub struct ShardedLruHashMap<K, V, S = DefaultHashBuilder> {
    shards: Box<[LruHashMap<K, V, S>]>,
    hasher: S,
}

impl<K, V> ShardedLruHashMap<K, V>
where
    K: Eq + Hash,
{
    /// `capacity` is the total, split evenly (rounded up) across `shards`.
    pub fn new(shards: usize, capacity: usize) -> Result<Self> {
        Builder::new(capacity).build_sharded(shards)
    }
}

impl<K, V, S> ShardedLruHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    pub(crate) fn from_parts(
        shards: usize,
        capacity: usize,
        load_factor: f32,
        value_factory: Option<ValueFactory<K, V>>,
        hasher: S,
    ) -> Result<Self> {
        if shards == 0 {
            return Err(Error::InvalidShardCount(shards));
        }
        let per_shard = capacity.div_ceil(shards);
        if per_shard <= 1 {
            return Err(Error::InvalidCapacity(capacity));
        }
        let shards = (0..shards)
            .map(|_| -> Result<LruHashMap<K, V, S>> {
                let table = LruTable::with_load_factor_and_hasher(per_shard, load_factor, hasher.clone())?;
                Ok(LruHashMap::from_parts(table, value_factory.clone()))
            })
            .collect::<Result<Box<[_]>>>()?;
        debug!(shards = shards.len(), per_shard, "created sharded lru map");
        Ok(Self { shards, hasher })
    }

    fn shard<Q>(&self, q: &Q) -> &LruHashMap<K, V, S>
    where
        Q: ?Sized + Hash,
    {
        let hash = self.hasher.hash_one(q);
        &self.shards[((hash ^ (hash >> 32)) % self.shards.len() as u64) as usize]
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Sum of shard capacities; at least the requested total.
    pub fn capacity(&self) -> usize {
        self.shards.iter().map(|s| s.capacity()).sum()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.is_empty())
    }

    pub fn get<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.shard(q).get(q)
    }

    pub fn get_with<Q, R, F>(&self, q: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&mut V) -> R,
    {
        self.shard(q).get_with(q, f)
    }

    pub fn peek<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.shard(q).peek(q)
    }

    pub fn touch<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shard(q).touch(q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shard(q).contains_key(q)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.shards.iter().any(|s| s.contains_value(value))
    }

    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.shard(&key).put(key, value)
    }

    pub fn put_all<I>(&self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in pairs {
            self.put(k, v);
        }
    }

    pub fn remove<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shard(q).remove(q)
    }

    pub fn get_or_create(&self, key: K) -> Result<V>
    where
        V: Clone,
    {
        self.shard(&key).get_or_create(key)
    }

    /// Recycles within the key's shard: the value comes from that shard's
    /// oldest entry when the shard is full.
    pub fn get_or_create_or_recycle(&self, key: K) -> Result<V>
    where
        V: Clone,
    {
        self.shard(&key).get_or_create_or_recycle(key)
    }

    pub fn clear(&self) {
        for s in self.shards.iter() {
            s.clear();
        }
    }

    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.shards.iter().flat_map(|s| s.keys()).collect()
    }

    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.shards.iter().flat_map(|s| s.values()).collect()
    }

    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.shards.iter().flat_map(|s| s.entries()).collect()
    }
}

impl<K, V, S> fmt::Debug for ShardedLruHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedLruHashMap")
            .field("shards", &self.shards)
            .finish()
    }
}

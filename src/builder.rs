//! Builder: configuration for `LruTable`, `LruHashMap` and `ShardedLruHashMap`.

use crate::error::Result;
use crate::lru_hash_map::{LruHashMap, ValueFactory};
use crate::lru_table::{LruTable, DEFAULT_LOAD_FACTOR};
use crate::sharded::ShardedLruHashMap;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;
use std::sync::Arc;

/// Collects construction parameters; validation happens in `build*`.
///
/// ```
/// use lru_hashmap::LruHashMap;
///
/// let users = LruHashMap::builder(1024)
///     .load_factor(0.5)
///     .value_factory(|id: &u64| format!("user-{id}"))
///     .build()
///     .unwrap();
/// assert_eq!(users.get_or_create(7).unwrap(), "user-7");
/// ```
pub struct Builder<K, V, S = DefaultHashBuilder> {
    capacity: usize,
    load_factor: f32,
    value_factory: Option<ValueFactory<K, V>>,
    hasher: S,
}

impl<K, V> Builder<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            load_factor: DEFAULT_LOAD_FACTOR,
            value_factory: None,
            hasher: DefaultHashBuilder::default(),
        }
    }
}

impl<K, V, S> Builder<K, V, S> {
    /// Entries per bucket at full capacity; smaller means more buckets.
    pub fn load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Function used by `get_or_create*` to build values for missing keys.
    /// It runs while the map's lock is held.
    pub fn value_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        self.value_factory = Some(Arc::new(factory));
        self
    }

    pub fn hasher<S2>(self, hasher: S2) -> Builder<K, V, S2> {
        Builder {
            capacity: self.capacity,
            load_factor: self.load_factor,
            value_factory: self.value_factory,
            hasher,
        }
    }

    /// Unsynchronized table. A configured value factory is dropped; the
    /// table's `get_or_insert_with` takes its factory per call.
    pub fn build_table(self) -> Result<LruTable<K, V, S>>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        LruTable::with_load_factor_and_hasher(self.capacity, self.load_factor, self.hasher)
    }

    pub fn build(self) -> Result<LruHashMap<K, V, S>>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        let table = LruTable::with_load_factor_and_hasher(self.capacity, self.load_factor, self.hasher)?;
        Ok(LruHashMap::from_parts(table, self.value_factory))
    }

    /// Split `capacity` across `shards` independently locked maps.
    pub fn build_sharded(self, shards: usize) -> Result<ShardedLruHashMap<K, V, S>>
    where
        K: Eq + Hash,
        S: BuildHasher + Clone,
    {
        ShardedLruHashMap::from_parts(
            shards,
            self.capacity,
            self.load_factor,
            self.value_factory,
            self.hasher,
        )
    }
}

impl<K, V, S> fmt::Debug for Builder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("capacity", &self.capacity)
            .field("load_factor", &self.load_factor)
            .field("has_value_factory", &self.value_factory.is_some())
            .finish_non_exhaustive()
    }
}

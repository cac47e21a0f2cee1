//! LruHashMap: thread-safe public surface over `LruTable`.
//!
//! One `parking_lot::Mutex` guards the whole table. Every operation,
//! including promoting reads and snapshot accessors, runs under that lock, so
//! calls are linearizable and the order in which threads acquire it decides
//! the recency stamps, hence which entry is evicted. There is no lock-free
//! fast path.
//!
//! Values leave the map by clone; store `Arc<T>` when values are large or when
//! callers need identity (see `get_or_create_or_recycle`). Use `get_with` to
//! read a value in place without cloning it.
//!
//! The value factory runs under the lock. It must not call back into the same
//! map; debug builds detect that and panic instead of deadlocking.

use crate::builder::Builder;
use crate::error::{Error, Result};
use crate::lru_table::LruTable;
use crate::reentrancy::{DebugReentrancy, ReentrancyGuard};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::{Deref, DerefMut};
use hashbrown::hash_map::DefaultHashBuilder;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Builds a value for a missing key. Shared by every shard of a sharded map.
pub type ValueFactory<K, V> = Arc<dyn Fn(&K) -> V + Send + Sync>;

pub struct LruHashMap<K, V, S = DefaultHashBuilder> {
    table: Mutex<LruTable<K, V, S>>,
    value_factory: Option<ValueFactory<K, V>>,
    reentrancy: DebugReentrancy,
}

// Field order matters: ownership is released before the mutex unlocks.
struct Locked<'a, K, V, S> {
    _reentrancy: ReentrancyGuard<'a>,
    table: MutexGuard<'a, LruTable<K, V, S>>,
}

impl<'a, K, V, S> Deref for Locked<'a, K, V, S> {
    type Target = LruTable<K, V, S>;
    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

impl<'a, K, V, S> DerefMut for Locked<'a, K, V, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.table
    }
}

impl<K, V> LruHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self::from(LruTable::new(capacity)?))
    }

    pub fn with_load_factor(capacity: usize, load_factor: f32) -> Result<Self> {
        Ok(Self::from(LruTable::with_load_factor(capacity, load_factor)?))
    }

    /// Start configuring a map; see [`Builder`].
    pub fn builder(capacity: usize) -> Builder<K, V> {
        Builder::new(capacity)
    }
}

impl<K, V, S> From<LruTable<K, V, S>> for LruHashMap<K, V, S> {
    fn from(table: LruTable<K, V, S>) -> Self {
        Self::from_parts(table, None)
    }
}

impl<K, V, S> LruHashMap<K, V, S> {
    pub(crate) fn from_parts(table: LruTable<K, V, S>, value_factory: Option<ValueFactory<K, V>>) -> Self {
        Self {
            table: Mutex::new(table),
            value_factory,
            reentrancy: DebugReentrancy::new(),
        }
    }

    fn lock(&self) -> Locked<'_, K, V, S> {
        self.reentrancy.check();
        let table = self.table.lock();
        Locked {
            _reentrancy: self.reentrancy.enter(),
            table,
        }
    }

    pub fn has_value_factory(&self) -> bool {
        self.value_factory.is_some()
    }

    /// Unwrap the table. No other thread can hold the lock once `self` is owned.
    pub fn into_inner(self) -> LruTable<K, V, S> {
        self.table.into_inner()
    }
}

impl<K, V, S> LruHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn load_factor(&self) -> f32 {
        self.lock().load_factor()
    }

    pub fn bucket_count(&self) -> usize {
        self.lock().bucket_count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Promoting read.
    pub fn get<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.lock().get(q).cloned()
    }

    /// Promoting read that hands the value to `f` under the lock.
    pub fn get_with<Q, R, F>(&self, q: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&mut V) -> R,
    {
        self.lock().get_mut(q).map(f)
    }

    /// Read without affecting eviction order.
    pub fn peek<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.lock().peek(q).cloned()
    }

    pub fn touch<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lock().touch(q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lock().contains_key(q)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.lock().contains_value(value)
    }

    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.lock().put(key, value)
    }

    /// Apply `put` to each pair under a single lock acquisition.
    pub fn put_all<I>(&self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.lock().put_all(pairs)
    }

    pub fn remove<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lock().remove(q)
    }

    pub fn evict_oldest(&self) -> Result<(K, V)> {
        self.lock().evict_oldest()
    }

    /// Promoting read on a hit; on a miss, build the value with the configured
    /// factory, insert it, and return it.
    pub fn get_or_create(&self, key: K) -> Result<V>
    where
        V: Clone,
    {
        let factory = self.value_factory.as_deref();
        self.lock()
            .try_get_or_insert_with(key, |k| factory.map(|f| f(k)).ok_or(Error::MissingValueFactory))
            .cloned()
    }

    /// Like [`get_or_create`](Self::get_or_create), but a miss on a full map
    /// evicts the least-recently-used entry and rebinds its value to `key`
    /// instead of calling the factory. The returned value is the evicted one,
    /// so with `V = Arc<T>` it is pointer-identical to what the old key held.
    pub fn get_or_create_or_recycle(&self, key: K) -> Result<V>
    where
        V: Clone,
    {
        let factory = self.value_factory.as_deref();
        self.lock()
            .try_get_or_recycle_with(key, |k| factory.map(|f| f(k)).ok_or(Error::MissingValueFactory))
            .cloned()
    }

    pub fn clear(&self) {
        self.lock().clear()
    }

    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.lock().keys()
    }

    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.lock().values()
    }

    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.lock().entries()
    }
}

impl<K, V, S> fmt::Debug for LruHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.lock();
        f.debug_struct("LruHashMap")
            .field("capacity", &table.capacity())
            .field("len", &table.len())
            .field("bucket_count", &table.bucket_count())
            .field("has_value_factory", &self.value_factory.is_some())
            .finish_non_exhaustive()
    }
}

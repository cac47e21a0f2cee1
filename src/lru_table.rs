//! LruTable: capacity-bounded map with least-recently-used eviction, built
//! on the chained bucket layer.
//!
//! Every entry carries a recency stamp drawn from a per-table logical clock.
//! The clock starts at `i64::MIN` and is pre-incremented on each insert,
//! update, and promoting read, so stamps are unique and strictly increasing.
//! When an insert pushes `len` past `capacity`, one full scan over the
//! buckets finds the smallest stamp and unlinks that entry. There is no
//! auxiliary ordering list; eviction costs O(len).
//!
//! Ties cannot occur because stamps are unique. The scan keeps the first
//! minimum it sees in bucket-then-chain order.

use crate::chain_table::{ChainTable, Link, NodeKey};
use crate::error::{Error, Result};
use core::borrow::Borrow;
use core::convert::Infallible;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;
use tracing::{debug, trace};

/// Load factor used when none is given.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

const INITIAL_RECENCY: i64 = i64::MIN;

// Largest bucket array whose byte size still fits in `isize`.
const MAX_BUCKETS: usize = isize::MAX as usize / core::mem::size_of::<Option<NodeKey>>();

/// Validate construction parameters and derive the bucket count,
/// `floor(capacity / load_factor)`, never less than one bucket.
pub(crate) fn bucket_count(capacity: usize, load_factor: f32) -> Result<usize> {
    if capacity <= 1 {
        return Err(Error::InvalidCapacity(capacity));
    }
    if load_factor.is_nan() || load_factor <= 0.0 {
        return Err(Error::InvalidLoadFactor(load_factor));
    }
    let buckets = (capacity as f64 / load_factor as f64).floor();
    if buckets > MAX_BUCKETS as f64 {
        return Err(Error::InvalidLoadFactor(load_factor));
    }
    Ok((buckets as usize).max(1))
}

/// Unsynchronized bounded LRU map. See [`crate::LruHashMap`] for the
/// thread-safe wrapper.
pub struct LruTable<K, V, S = DefaultHashBuilder> {
    table: ChainTable<K, V, S>,
    capacity: usize,
    load_factor: f32,
    recency: i64,
}

impl<K, V> LruTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_load_factor(capacity, DEFAULT_LOAD_FACTOR)
    }

    pub fn with_load_factor(capacity: usize, load_factor: f32) -> Result<Self> {
        Self::with_load_factor_and_hasher(capacity, load_factor, DefaultHashBuilder::default())
    }
}

impl<K, V, S> LruTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(capacity: usize, hasher: S) -> Result<Self> {
        Self::with_load_factor_and_hasher(capacity, DEFAULT_LOAD_FACTOR, hasher)
    }

    pub fn with_load_factor_and_hasher(capacity: usize, load_factor: f32, hasher: S) -> Result<Self> {
        let buckets = bucket_count(capacity, load_factor)?;
        debug!(capacity, buckets, load_factor, "created lru table");
        Ok(Self {
            // Node slots grow on demand; reserve no more than the bucket array.
            table: ChainTable::with_hasher(buckets, buckets.min(capacity.saturating_add(1)), hasher),
            capacity,
            load_factor,
            recency: INITIAL_RECENCY,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    #[inline]
    fn next_recency(&mut self) -> i64 {
        self.recency += 1;
        self.recency
    }

    fn promote(&mut self, k: NodeKey) {
        let stamp = self.next_recency();
        self.table.node_mut(k).recency = stamp;
    }

    fn find<Q>(&self, q: &Q) -> Option<Link>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.table.make_hash(q);
        self.table.find(hash, q)
    }

    /// Promoting read: marks the entry most-recently-used.
    pub fn get<Q>(&mut self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let link = self.find(q)?;
        self.promote(link.node);
        Some(&self.table.node(link.node).value)
    }

    /// Promoting mutable access.
    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let link = self.find(q)?;
        self.promote(link.node);
        Some(&mut self.table.node_mut(link.node).value)
    }

    /// Read without affecting eviction order.
    pub fn peek<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).map(|link| &self.table.node(link.node).value)
    }

    /// Promote without reading; returns whether the key was present.
    pub fn touch<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.find(q) {
            Some(link) => {
                self.promote(link.node);
                true
            }
            None => false,
        }
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    /// Full scan; O(len).
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.table.iter().any(|node| node.value == *value)
    }

    /// Insert or update. An existing key keeps its chain position, gets a
    /// fresh stamp, and its previous value is returned. A new key is appended
    /// to its chain; if that overflows capacity the oldest entry is evicted.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.table.make_hash(&key);
        if let Some(link) = self.table.find(hash, &key) {
            self.promote(link.node);
            let node = self.table.node_mut(link.node);
            return Some(core::mem::replace(&mut node.value, value));
        }
        self.insert_new(key, value, hash);
        None
    }

    /// `put` each pair in iteration order. Entries early in a batch larger
    /// than `capacity` are evicted by later ones.
    pub fn put_all<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in pairs {
            self.put(k, v);
        }
    }

    fn insert_new(&mut self, key: K, value: V, hash: u64) -> NodeKey {
        let stamp = self.next_recency();
        let k = self.table.push_back(key, value, hash, stamp);
        if self.table.len() > self.capacity {
            // The new node holds the newest stamp and is never the one evicted.
            if let Some(link) = self.oldest() {
                let evicted = self.table.detach(link);
                trace!(
                    capacity = self.capacity,
                    len = self.table.len(),
                    recency = evicted.recency,
                    "evicted least-recently-used entry"
                );
            }
        }
        k
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let link = self.find(q)?;
        let node = self.table.detach(link);
        Some((node.key, node.value))
    }

    /// Position of the entry with the smallest stamp, first seen on ties.
    fn oldest(&self) -> Option<Link> {
        let mut best: Option<(i64, Link)> = None;
        for link in self.table.links() {
            let recency = self.table.node(link.node).recency;
            if best.map_or(true, |(min, _)| recency < min) {
                best = Some((recency, link));
            }
        }
        best.map(|(_, link)| link)
    }

    /// Remove and return the least-recently-used entry.
    pub fn evict_oldest(&mut self) -> Result<(K, V)> {
        let link = self.oldest().ok_or(Error::Empty)?;
        let node = self.table.detach(link);
        Ok((node.key, node.value))
    }

    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> &V
    where
        F: FnOnce(&K) -> V,
    {
        match self.try_get_or_insert_with(key, |k| Ok::<V, Infallible>(make(k))) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Promoting read on a hit; on a miss, build a value with `make` and insert
    /// it. A failing `make` leaves the table untouched.
    pub fn try_get_or_insert_with<F, E>(&mut self, key: K, make: F) -> core::result::Result<&V, E>
    where
        F: FnOnce(&K) -> core::result::Result<V, E>,
    {
        let hash = self.table.make_hash(&key);
        let k = match self.table.find(hash, &key) {
            Some(link) => {
                self.promote(link.node);
                link.node
            }
            None => {
                let value = make(&key)?;
                self.insert_new(key, value, hash)
            }
        };
        Ok(&self.table.node(k).value)
    }

    pub fn get_or_recycle_with<F>(&mut self, key: K, make: F) -> &V
    where
        F: FnOnce(&K) -> V,
    {
        match self.try_get_or_recycle_with(key, |k| Ok::<V, Infallible>(make(k))) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Like [`try_get_or_insert_with`](Self::try_get_or_insert_with), except
    /// that a miss on a full table does not call `make`: the oldest entry is
    /// evicted and its value is moved, as is, under `key`.
    pub fn try_get_or_recycle_with<F, E>(&mut self, key: K, make: F) -> core::result::Result<&V, E>
    where
        F: FnOnce(&K) -> core::result::Result<V, E>,
    {
        let hash = self.table.make_hash(&key);
        let k = match self.table.find(hash, &key) {
            Some(link) => {
                self.promote(link.node);
                link.node
            }
            None => {
                let recycled = if self.table.len() >= self.capacity {
                    self.oldest().map(|link| self.table.detach(link))
                } else {
                    None
                };
                let value = match recycled {
                    Some(node) => {
                        trace!(recency = node.recency, "recycling value of oldest entry");
                        node.value
                    }
                    None => make(&key)?,
                };
                self.insert_new(key, value, hash)
            }
        };
        Ok(&self.table.node(k).value)
    }

    /// Drop every entry and restart the recency clock. Buckets are kept.
    pub fn clear(&mut self) {
        self.table.clear();
        self.recency = INITIAL_RECENCY;
        debug!(capacity = self.capacity, "cleared lru table");
    }

    /// Entries in bucket-then-chain order; the order carries no meaning.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.table.iter(),
        }
    }

    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Iterator over `(&K, &V)` in an unspecified order.
pub struct Iter<'a, K, V> {
    it: crate::chain_table::Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|node| (&node.key, &node.value))
    }
}

impl<'a, K, V, S> IntoIterator for &'a LruTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> Extend<(K, V)> for LruTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.put_all(iter);
    }
}

impl<K, V, S> fmt::Debug for LruTable<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

//! ChainTable: structural layer. A fixed bucket array whose slots hold the
//! heads of singly-linked collision chains.
//!
//! Nodes live in an arena owned by the table; a bucket stores the key of its
//! chain head and every node stores the key of its successor. The table
//! never reorders a chain: new nodes are appended at the tail and unlinking
//! splices the predecessor onto the successor.
//!
//! Each node caches its `u64` key hash, so lookups compare hashes before
//! calling `K: Eq`. This layer knows nothing about recency or capacity.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Arena key of a chain node.
    pub(crate) struct NodeKey;
}

#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
    pub(crate) recency: i64,
    next: Option<NodeKey>,
}

/// Where a node sits: its bucket and its predecessor in that bucket's chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) bucket: usize,
    pub(crate) prev: Option<NodeKey>,
    pub(crate) node: NodeKey,
}

pub(crate) struct ChainTable<K, V, S> {
    hasher: S,
    buckets: Box<[Option<NodeKey>]>,
    nodes: SlotMap<NodeKey, Node<K, V>>,
}

impl<K, V, S> ChainTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// `bucket_count` must be non-zero; `node_capacity` only presizes the arena.
    pub(crate) fn with_hasher(bucket_count: usize, node_capacity: usize, hasher: S) -> Self {
        debug_assert!(bucket_count > 0, "bucket array must not be empty");
        Self {
            hasher,
            buckets: vec![None; bucket_count].into_boxed_slice(),
            nodes: SlotMap::with_capacity_and_key(node_capacity),
        }
    }

    pub(crate) fn hasher(&self) -> &S {
        &self.hasher
    }

    pub(crate) fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Hashes are unsigned, so the remainder is always a valid bucket.
    #[inline]
    pub(crate) fn index(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn find<Q>(&self, hash: u64, q: &Q) -> Option<Link>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let bucket = self.index(hash);
        let mut prev = None;
        let mut cursor = self.buckets[bucket];
        while let Some(k) = cursor {
            let node = &self.nodes[k];
            if node.hash == hash && node.key.borrow() == q {
                return Some(Link {
                    bucket,
                    prev,
                    node: k,
                });
            }
            prev = cursor;
            cursor = node.next;
        }
        None
    }

    pub(crate) fn node(&self, k: NodeKey) -> &Node<K, V> {
        &self.nodes[k]
    }

    pub(crate) fn node_mut(&mut self, k: NodeKey) -> &mut Node<K, V> {
        &mut self.nodes[k]
    }

    /// Append a new node at the tail of its bucket's chain.
    pub(crate) fn push_back(&mut self, key: K, value: V, hash: u64, recency: i64) -> NodeKey {
        let bucket = self.index(hash);
        let k = self.nodes.insert(Node {
            key,
            value,
            hash,
            recency,
            next: None,
        });
        let head = self.buckets[bucket];
        match head {
            None => self.buckets[bucket] = Some(k),
            Some(head) => {
                let mut tail = head;
                while let Some(next) = self.nodes[tail].next {
                    tail = next;
                }
                self.nodes[tail].next = Some(k);
            }
        }
        k
    }

    /// Unlink the node at `link` and hand ownership of it back to the caller.
    ///
    /// `link` must come from a `find` or traversal with no mutation since.
    pub(crate) fn detach(&mut self, link: Link) -> Node<K, V> {
        let node = self
            .nodes
            .remove(link.node)
            .expect("link refers to a live node");
        match link.prev {
            None => {
                debug_assert_eq!(self.buckets[link.bucket], Some(link.node));
                self.buckets[link.bucket] = node.next;
            }
            Some(prev) => {
                debug_assert_eq!(self.nodes[prev].next, Some(link.node));
                self.nodes[prev].next = node.next;
            }
        }
        node
    }

    /// Every node in bucket order, then chain order within a bucket.
    pub(crate) fn links(&self) -> Links<'_, K, V> {
        Links {
            buckets: &self.buckets,
            nodes: &self.nodes,
            next_bucket: 0,
            bucket: 0,
            prev: None,
            cursor: None,
        }
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            links: self.links(),
        }
    }

    /// Empty every bucket; the bucket array itself is kept.
    pub(crate) fn clear(&mut self) {
        self.buckets.fill(None);
        self.nodes.clear();
    }
}

pub(crate) struct Links<'a, K, V> {
    buckets: &'a [Option<NodeKey>],
    nodes: &'a SlotMap<NodeKey, Node<K, V>>,
    next_bucket: usize,
    bucket: usize,
    prev: Option<NodeKey>,
    cursor: Option<NodeKey>,
}

impl<'a, K, V> Iterator for Links<'a, K, V> {
    type Item = Link;

    fn next(&mut self) -> Option<Link> {
        loop {
            if let Some(node) = self.cursor {
                let link = Link {
                    bucket: self.bucket,
                    prev: self.prev,
                    node,
                };
                self.prev = Some(node);
                self.cursor = self.nodes[node].next;
                return Some(link);
            }
            let head = *self.buckets.get(self.next_bucket)?;
            self.bucket = self.next_bucket;
            self.next_bucket += 1;
            self.prev = None;
            self.cursor = head;
        }
    }
}

/// Borrowing iterator over nodes in traversal order.
pub(crate) struct Iter<'a, K, V> {
    links: Links<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = &'a Node<K, V>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let link = self.links.next()?;
        let nodes: &'a SlotMap<NodeKey, Node<K, V>> = self.links.nodes;
        Some(&nodes[link.node])
    }
}

#![cfg(test)]

// Property tests for LruTable kept inside the crate so they can reuse the
// constant hasher from the chain table tests.

use crate::chain_table::tests::ConstBuildHasher;
use crate::error::Error;
use crate::lru_table::LruTable;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::BuildHasher;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Put(usize, i32),
    Get(usize),
    Peek(usize),
    Touch(usize),
    Remove(usize),
    Contains(String),
    EvictOldest,
    GetOrInsert(usize, i32),
    Recycle(usize, i32),
    Clear,
    Snapshot,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (usize, Vec<String>, Vec<OpI>)> {
    (2usize..=5, proptest::collection::vec("[a-z]{0,3}", 1..=8)).prop_flat_map(|(capacity, pool)| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Put(i, v)),
            3 => idx.clone().prop_map(OpI::Get),
            1 => idx.clone().prop_map(OpI::Peek),
            1 => idx.clone().prop_map(OpI::Touch),
            2 => idx.clone().prop_map(OpI::Remove),
            1 => prop_oneof![contains_pool.prop_map(|s: String| s), "[a-z]{0,3}".prop_map(|s| s)]
                .prop_map(OpI::Contains),
            1 => Just(OpI::EvictOldest),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::GetOrInsert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Recycle(i, v)),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Snapshot),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (capacity, pool.clone(), ops))
    })
}

/// Reference LRU: a plain map from key to (value, stamp) and a counter.
struct Model {
    capacity: usize,
    clock: i64,
    entries: HashMap<Key, (i32, i64)>,
}

impl Model {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clock: 0,
            entries: HashMap::new(),
        }
    }

    fn stamp(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn insert_new(&mut self, k: Key, v: i32) {
        let s = self.stamp();
        self.entries.insert(k, (v, s));
        if self.entries.len() > self.capacity {
            self.evict();
        }
    }

    fn put(&mut self, k: Key, v: i32) -> Option<i32> {
        if self.entries.contains_key(&k) {
            let s = self.stamp();
            let e = self.entries.get_mut(&k).unwrap();
            let old = e.0;
            *e = (v, s);
            return Some(old);
        }
        self.insert_new(k, v);
        None
    }

    fn get(&mut self, k: &Key) -> Option<i32> {
        if !self.entries.contains_key(k) {
            return None;
        }
        let s = self.stamp();
        let e = self.entries.get_mut(k).unwrap();
        e.1 = s;
        Some(e.0)
    }

    fn evict(&mut self) -> Option<(Key, i32)> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (_, s))| *s)
            .map(|(k, _)| k.clone())?;
        let (v, _) = self.entries.remove(&oldest).unwrap();
        Some((oldest, v))
    }

    fn get_or_insert(&mut self, k: Key, v: i32) -> i32 {
        match self.get(&k) {
            Some(found) => found,
            None => {
                self.insert_new(k, v);
                v
            }
        }
    }

    fn recycle(&mut self, k: Key, v: i32) -> i32 {
        if let Some(found) = self.get(&k) {
            return found;
        }
        let value = if self.entries.len() >= self.capacity {
            self.evict().map(|(_, old)| old).unwrap_or(v)
        } else {
            v
        };
        self.insert_new(k, value);
        value
    }

    fn snapshot(&self) -> BTreeMap<Key, i32> {
        self.entries.iter().map(|(k, (v, _))| (k.clone(), *v)).collect()
    }
}

// Property: state-machine equivalence against the reference model.
// Invariants exercised across random operation sequences:
// - `len() <= capacity` after every op, and `len`/`is_empty` match the model.
// - Put returns the previous value on update and evicts the smallest stamp
//   on overflow; get promotes, peek/contains do not.
// - `evict_oldest` removes exactly the model's oldest entry, or fails on empty.
// - Recycling reuses the evicted value only when the table is full.
// - Contents (keys and values) equal the model after each op.
fn run_scenario<S: BuildHasher>(
    mut sut: LruTable<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model = Model::new(sut.capacity());

    for op in ops {
        match op {
            OpI::Put(i, v) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.put(k.clone(), v), model.put(k, v));
            }
            OpI::Get(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.get(&k).copied(), model.get(&k));
            }
            OpI::Peek(i) => {
                let k = key_from(&pool, i);
                let expected = model.entries.get(&k).map(|(v, _)| *v);
                prop_assert_eq!(sut.peek(&k).copied(), expected);
            }
            OpI::Touch(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.touch(&k), model.get(&k).is_some());
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                let expected = model.entries.remove(&k).map(|(v, _)| v);
                prop_assert_eq!(sut.remove(&k), expected);
            }
            OpI::Contains(s) => {
                let has_model = model.entries.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::EvictOldest => match model.evict() {
                Some(expected) => prop_assert_eq!(sut.evict_oldest(), Ok(expected)),
                None => prop_assert_eq!(sut.evict_oldest(), Err(Error::Empty)),
            },
            OpI::GetOrInsert(i, v) => {
                let k = key_from(&pool, i);
                let got = *sut.get_or_insert_with(k.clone(), |_| v);
                prop_assert_eq!(got, model.get_or_insert(k, v));
            }
            OpI::Recycle(i, v) => {
                let k = key_from(&pool, i);
                let got = *sut.get_or_recycle_with(k.clone(), |_| v);
                prop_assert_eq!(got, model.recycle(k, v));
            }
            OpI::Clear => {
                sut.clear();
                model.entries.clear();
            }
            OpI::Snapshot => {
                let keys: BTreeSet<Key> = sut.keys().into_iter().collect();
                prop_assert_eq!(keys.len(), sut.len(), "keys snapshot has no duplicates");
                let m_keys: BTreeSet<Key> = model.entries.keys().cloned().collect();
                prop_assert_eq!(keys, m_keys);
            }
        }

        // Post-conditions after each op
        prop_assert!(sut.len() <= sut.capacity());
        prop_assert_eq!(sut.len(), model.entries.len());
        prop_assert_eq!(sut.is_empty(), model.entries.is_empty());
        let contents: BTreeMap<Key, i32> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(contents, model.snapshot());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((capacity, pool, ops) in arb_scenario()) {
        let sut: LruTable<Key, i32> = LruTable::new(capacity).unwrap();
        run_scenario(sut, pool, ops)?;
    }
}

// Same invariants under worst-case collisions (constant hasher): every entry
// shares one chain, stressing predecessor tracking on unlink and eviction.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((capacity, pool, ops) in arb_scenario()) {
        let sut: LruTable<Key, i32, ConstBuildHasher> =
            LruTable::with_hasher(capacity, ConstBuildHasher).unwrap();
        run_scenario(sut, pool, ops)?;
    }
}

// Load factors that force long chains or mostly-empty buckets must not
// change observable behavior.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_any_load_factor(
        (capacity, pool, ops) in arb_scenario(),
        load_factor in prop_oneof![0.05f32..1.0, 1.0f32..16.0],
    ) {
        let sut: LruTable<Key, i32> = LruTable::with_load_factor(capacity, load_factor).unwrap();
        run_scenario(sut, pool, ops)?;
    }
}

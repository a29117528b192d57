#![cfg(test)]

// Property tests for ChainHashMap kept inside the crate so they can check
// the bucket store's structural invariants directly.

use crate::chain_hash_map::ChainHashMap;
use crate::cursor::Cursor;
use crate::error::MapError;
use crate::policy::{BASE_CAPACITY, GROW_FACTOR};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

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

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    GetOrInsert(usize),
    Remove(usize),
    Find(usize),
    At(usize),
    Contains(String),
    Mutate(usize, i32),
    Iterate,
    Clear,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=40).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => idx.clone().prop_map(OpI::GetOrInsert),
            5 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Find),
            1 => idx.clone().prop_map(OpI::At),
            1 => prop_oneof![contains_pool, "[a-z]{0,4}"].prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Hasher that maps every key to 0, forcing one long chain.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// State-machine comparison against std::collections::HashMap.
// Invariants exercised after every operation:
// - first insert wins; duplicate inserts leave the model value in place.
// - `at` fails iff `find` is `end()`; `get_or_insert_default` inserts at most once.
// - iteration yields exactly `len()` unique pairs equal to the model.
// - capacity >= 1, stays within the grow/shrink band, and returns to base
//   capacity whenever the map becomes empty.
// - bucket chains, count and lead bucket reconcile with the stored entries.
// - cursors survive non-resizing inserts and unrelated removals, and report
//   `StaleCursor` after a resize, clear, or removal of their own entry.
fn run_scenario<S: BuildHasher>(
    mut sut: ChainHashMap<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut cursors: Vec<(Cursor, Key)> = Vec::new();
    let mut stale: Vec<Cursor> = Vec::new();

    for op in ops {
        let capacity_before = sut.capacity();
        let mut invalidated_all = false;
        let mut removed: Option<Key> = None;

        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let already = model.contains_key(&k);
                let inserted = sut.insert(k.clone(), v);
                prop_assert_eq!(inserted, !already);
                model.entry(k).or_insert(v);
            }
            OpI::GetOrInsert(i) => {
                let k = key_from(&pool, i);
                let expected = *model.entry(k.clone()).or_insert(0);
                let len_before = sut.len();
                let got = *sut.get_or_insert_default(k.clone());
                prop_assert_eq!(got, expected);
                prop_assert!(sut.len() == len_before || sut.len() == len_before + 1);
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                let got = sut.remove(&k);
                prop_assert_eq!(got, model.remove(&k));
                if got.is_some() {
                    removed = Some(k);
                    invalidated_all = sut.is_empty();
                }
            }
            OpI::Find(i) => {
                let k = key_from(&pool, i);
                let c = sut.find(&k);
                prop_assert_eq!(c == sut.end(), !model.contains_key(&k));
                if let Ok((ck, cv)) = c.entry(&sut) {
                    prop_assert_eq!(ck, &k);
                    prop_assert_eq!(Some(cv), model.get(&k));
                    cursors.push((c, k));
                }
            }
            OpI::At(i) => {
                let k = key_from(&pool, i);
                match sut.at(&k) {
                    Ok(v) => prop_assert_eq!(Some(v), model.get(&k)),
                    Err(e) => {
                        prop_assert_eq!(e, MapError::KeyNotFound);
                        prop_assert!(!model.contains_key(&k));
                    }
                }
                prop_assert_eq!(sut.at(&k).is_err(), sut.find(&k) == sut.end());
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(v) = sut.get_mut(&k) {
                    *v = v.wrapping_add(d);
                }
                if let Some(v) = model.get_mut(&k) {
                    *v = v.wrapping_add(d);
                }
            }
            OpI::Iterate => {
                let pairs: Vec<(Key, i32)> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(pairs.len(), sut.len());
                let unique: BTreeSet<&Key> = pairs.iter().map(|(k, _)| k).collect();
                prop_assert_eq!(unique.len(), pairs.len());
                let s_map: BTreeMap<Key, i32> = pairs.into_iter().collect();
                let m_map: BTreeMap<Key, i32> =
                    model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(s_map, m_map);
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                invalidated_all = true;
                prop_assert_eq!(sut.begin(), sut.end());
            }
        }

        if invalidated_all || sut.capacity() != capacity_before {
            stale.extend(cursors.drain(..).map(|(c, _)| c));
        } else if let Some(gone) = removed {
            let (dead, alive): (Vec<_>, Vec<_>) =
                cursors.drain(..).partition(|(_, k)| *k == gone);
            stale.extend(dead.into_iter().map(|(c, _)| c));
            cursors = alive;
        }

        // Post-conditions after each op
        sut.store().assert_consistent();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        let cap = sut.capacity();
        prop_assert!(cap >= 1);
        if sut.is_empty() {
            prop_assert_eq!(cap, BASE_CAPACITY);
            prop_assert_eq!(sut.begin(), sut.end());
        } else {
            prop_assert!(sut.len() * GROW_FACTOR <= cap, "over-full: len={} cap={}", sut.len(), cap);
        }
        for (c, k) in &cursors {
            prop_assert_eq!(c.key(&sut), Ok(k));
        }
        for c in &stale {
            prop_assert_eq!(c.value(&sut), Err(MapError::StaleCursor));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(ChainHashMap::new(), pool, ops)?;
    }

    // Same invariants with every key in one chain; stresses probing and
    // unlinking from the middle and tail of long chains.
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(ChainHashMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }

    // Property: a full cursor walk from `begin()` to `end()` visits the same
    // entries, in the same order, as `iter()`.
    #[test]
    fn prop_cursor_walk_matches_iter(keys in proptest::collection::vec(any::<u16>(), 0..200)) {
        let m: ChainHashMap<u16, u16> = keys.iter().map(|&k| (k, k)).collect();
        let mut walked = Vec::new();
        let mut c = m.begin();
        while c != m.end() {
            walked.push(*c.key(&m).unwrap());
            c = c.advance(&m).unwrap();
        }
        let iterated: Vec<u16> = m.keys().copied().collect();
        prop_assert_eq!(walked, iterated);
        prop_assert_eq!(m.end().advance(&m), Err(MapError::AtEnd));
    }
}

//! ChainHashMap: public map API over the bucket store.

use crate::bucket_store::BucketStore;
use crate::cursor::{Cursor, IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
use crate::error::{KeyNotFoundSnafu, MapError};
use crate::policy::BASE_CAPACITY;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use snafu::OptionExt;
use std::collections::hash_map::RandomState;

/// Separately chained hash map with load-factor driven resizing.
///
/// Inserting a key that is already present is a no-op: the first value
/// stays until the key is removed. See the crate docs for the resize
/// policy and cursor validity rules.
pub struct ChainHashMap<K, V, S = RandomState> {
    hasher: S,
    store: BucketStore<K, V>,
}

impl<K, V> ChainHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, S> Default for ChainHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

// Accessors that never hash or compare keys.
impl<K, V, S> ChainHashMap<K, V, S> {
    pub(crate) fn store(&self) -> &BucketStore<K, V> {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut BucketStore<K, V> {
        &mut self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Current number of buckets. Always at least 1.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Length of the chain in `bucket`, or `None` past the last bucket.
    pub fn bucket_len(&self, bucket: usize) -> Option<usize> {
        self.store.bucket_len(bucket)
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Alias of [`hasher`](Self::hasher).
    pub fn hash_function(&self) -> &S {
        &self.hasher
    }

    /// Remove every entry and go back to the base bucket count.
    /// Invalidates all cursors.
    pub fn clear(&mut self) {
        self.store.reset(BASE_CAPACITY);
    }

    /// Remove every entry and restart with `capacity` buckets (at least 1).
    pub fn clear_with_capacity(&mut self, capacity: usize) {
        log::trace!("clearing map to {} buckets", capacity.max(1));
        self.store.reset(capacity);
    }

    /// Cursor at the first entry, or `end()` when empty.
    pub fn begin(&self) -> Cursor {
        Cursor::new(self.store.begin(), self.store.epoch())
    }

    /// One-past-the-end cursor, positioned after the last bucket's chain.
    pub fn end(&self) -> Cursor {
        Cursor::new(self.store.end(), self.store.epoch())
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.store)
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.store)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }
}

impl<K, V, S> ChainHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            store: BucketStore::with_capacity(BASE_CAPACITY),
        }
    }

    /// Build from `(K, V)` pairs with an explicit hasher. Later duplicates
    /// of a key are ignored.
    pub fn from_iter_with_hasher<I>(iter: I, hasher: S) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::with_hasher(hasher);
        map.extend(iter);
        map
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Insert `key -> value` if `key` is absent. Returns `false`, leaving the
    /// stored value untouched, when the key already exists.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.make_hash(&key);
        self.store.insert_with(hash, key, || value).1
    }

    /// Value for `key`, inserting `default()` first when absent. The closure
    /// only runs on insert.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        let (nk, _) = self.store.insert_with(hash, key, default);
        &mut self.store[nk].value
    }

    /// Value for `key`, inserting `V::default()` first when absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Cursor at `q`'s entry, or `end()` when absent.
    pub fn find<Q>(&self, q: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.store.lookup(self.make_hash(q), q) {
            Some((bucket, nk)) => Cursor::new((bucket, Some(nk)), self.store.epoch()),
            None => self.end(),
        }
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, nk) = self.store.lookup(self.make_hash(q), q)?;
        let node = &self.store[nk];
        Some((&node.key, &node.value))
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, nk) = self.store.lookup(self.make_hash(q), q)?;
        Some(&mut self.store[nk].value)
    }

    /// Strict lookup: fails with [`MapError::KeyNotFound`] when absent.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, MapError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).context(KeyNotFoundSnafu)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.store.lookup(self.make_hash(q), q).is_some()
    }

    /// Remove `q`'s entry and return its value. A missing key is a no-op.
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
        let hash = self.make_hash(q);
        self.store.remove(hash, q)
    }
}

impl<K, V, S> Clone for ChainHashMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Deep copy: a fresh base-capacity table filled in `self`'s iteration
    /// order, sharing a clone of the hasher.
    fn clone(&self) -> Self {
        let mut map = Self::with_hasher(self.hasher.clone());
        map.copy_entries_from(self);
        map
    }

    fn clone_from(&mut self, source: &Self) {
        self.clear();
        self.hasher = source.hasher.clone();
        self.copy_entries_from(source);
    }
}

impl<K, V, S> ChainHashMap<K, V, S>
where
    K: Eq + Clone,
    V: Clone,
{
    // The hasher was cloned from `source`, so its cached hashes still apply.
    fn copy_entries_from(&mut self, source: &Self) {
        let mut it = source.iter();
        while let Some(node) = it.next_node() {
            self.store
                .insert_with(node.hash, node.key.clone(), || node.value.clone());
        }
    }
}

impl<K, V, S> fmt::Debug for ChainHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for ChainHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> Eq for ChainHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S> Index<&Q> for ChainHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    type Output = V;

    /// Panics when `key` is absent; use [`at`](ChainHashMap::at) to get an error instead.
    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("{}", MapError::KeyNotFound),
        }
    }
}

impl<K, V, S> Extend<(K, V)> for ChainHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, S> Extend<(&'a K, &'a V)> for ChainHashMap<K, V, S>
where
    K: Eq + Hash + Copy,
    V: Copy,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: I) {
        self.extend(iter.into_iter().map(|(&k, &v)| (k, v)));
    }
}

impl<K, V, S> FromIterator<(K, V)> for ChainHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_iter_with_hasher(iter, S::default())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for ChainHashMap<K, V, RandomState>
where
    K: Eq + Hash,
{
    fn from(arr: [(K, V); N]) -> Self {
        arr.into_iter().collect()
    }
}

impl<'a, K, V, S> IntoIterator for &'a ChainHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut ChainHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S> IntoIterator for ChainHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn init_test_logger() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Trace)
            .is_test(true)
            .try_init();
    }

    /// Invariant: the first value inserted for a key wins until removal.
    #[test]
    fn duplicate_insert_keeps_first_value() {
        let mut m: ChainHashMap<String, i32> = ChainHashMap::new();
        assert!(m.insert("dup".to_string(), 1));
        assert!(!m.insert("dup".to_string(), 2));
        assert_eq!(m.get("dup"), Some(&1));
        assert_eq!(m.len(), 1);

        m.remove("dup");
        assert!(m.insert("dup".to_string(), 3));
        assert_eq!(m.get("dup"), Some(&3));
    }

    /// Invariant: borrowed lookup works (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m: ChainHashMap<String, i32> = ChainHashMap::new();
        m.insert("hello".to_string(), 1);
        assert!(m.contains_key("hello"));
        assert!(!m.contains_key("world"));
        assert_eq!(m.at("hello"), Ok(&1));
        assert_eq!(m.at("world"), Err(MapError::KeyNotFound));
        assert_eq!(m.get_key_value("hello"), Some((&"hello".to_string(), &1)));
    }

    /// Invariant: `at` fails exactly when `find` returns `end()`.
    #[test]
    fn at_and_find_agree() {
        let m: ChainHashMap<i32, i32> = (0..20).map(|i| (i * 3, i)).collect();
        for k in -5..70 {
            assert_eq!(m.at(&k).is_err(), m.find(&k) == m.end(), "key {k}");
        }
    }

    /// Invariant: `get_or_insert_with` only runs its closure when inserting and
    /// keeps returning the same stored value.
    #[test]
    fn get_or_insert_with_is_lazy_and_idempotent() {
        let mut m: ChainHashMap<&'static str, Vec<i32>> = ChainHashMap::new();
        let calls = Cell::new(0);
        let make = || {
            calls.set(calls.get() + 1);
            Vec::new()
        };
        m.get_or_insert_with("k", make).push(1);
        let first = m.get_or_insert_with("k", make) as *const Vec<i32>;
        let second = m.get_or_insert_default("k") as *const Vec<i32>;
        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(m.get("k"), Some(&vec![1]));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: a reference handed out by `get_or_insert_default` refers to
    /// the stored value even when that insert triggered a grow.
    #[test]
    fn get_or_insert_survives_growth() {
        let mut m: ChainHashMap<u32, u32> = ChainHashMap::new();
        for i in 0..5 {
            m.insert(i, i);
        }
        let before = m.capacity();
        *m.get_or_insert_default(99) += 7;
        assert!(m.capacity() > before);
        assert_eq!(m.get(&99), Some(&7));
    }

    #[test]
    fn get_mut_updates_value() {
        let mut m: ChainHashMap<String, i32> = ChainHashMap::new();
        m.insert("a".to_string(), 1);
        *m.get_mut("a").unwrap() += 41;
        assert_eq!(m["a"], 42);
        assert!(m.get_mut("b").is_none());
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn index_panics_on_missing_key() {
        let m: ChainHashMap<i32, i32> = ChainHashMap::new();
        let _ = m[&1];
    }

    #[test]
    fn remove_returns_value_and_ignores_missing() {
        let mut m = ChainHashMap::from([(1, "a"), (2, "b")]);
        assert_eq!(m.remove(&3), None);
        assert_eq!(m.len(), 2);
        assert_eq!(m.remove_entry(&1), Some((1, "a")));
        assert_eq!(m.remove(&1), None);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn clear_resets_capacity_and_cursors() {
        init_test_logger();
        let mut m: ChainHashMap<u32, u32> = (0..100).map(|i| (i, i)).collect();
        assert!(m.capacity() > BASE_CAPACITY);
        m.clear();
        assert_eq!(m.len(), 0);
        assert_eq!(m.capacity(), BASE_CAPACITY);
        assert_eq!(m.begin(), m.end());

        m.clear_with_capacity(3);
        assert_eq!(m.capacity(), 3);
        m.clear_with_capacity(0);
        assert_eq!(m.capacity(), 1);
        m.insert(1, 1);
        assert_eq!(m.get(&1), Some(&1));
    }

    #[test]
    fn clone_is_deep_and_independent() {
        let original: ChainHashMap<String, Vec<i32>> =
            [("a", 1), ("b", 2)].iter().map(|(k, v)| (k.to_string(), vec![*v])).collect();
        let mut copy = original.clone();
        assert_eq!(copy, original);
        assert_eq!(copy.capacity(), BASE_CAPACITY);

        copy.get_mut("a").unwrap().push(10);
        copy.insert("c".to_string(), vec![3]);
        assert_eq!(original.get("a"), Some(&vec![1]));
        assert!(!original.contains_key("c"));
        assert_ne!(copy, original);
    }

    #[test]
    fn clone_from_replaces_contents() {
        let source = ChainHashMap::from([(1, 10), (2, 20)]);
        let mut target = ChainHashMap::from([(3, 30)]);
        target.clone_from(&source);
        assert_eq!(target, source);
        assert!(!target.contains_key(&3));
    }

    #[test]
    fn extend_keeps_first_of_duplicates() {
        let mut m: ChainHashMap<i32, i32> = ChainHashMap::new();
        m.extend(vec![(1, 1), (2, 2), (1, 100)]);
        let more = [(3, 3), (2, 200)];
        m.extend(more.iter().map(|(k, v)| (k, v)));
        assert_eq!(m.len(), 3);
        assert_eq!(m[&1], 1);
        assert_eq!(m[&2], 2);
        assert_eq!(m[&3], 3);
    }

    #[test]
    fn equality_ignores_order_and_capacity() {
        let a: ChainHashMap<i32, i32> = (0..50).map(|i| (i, i)).collect();
        let mut b: ChainHashMap<i32, i32> = (0..60).rev().map(|i| (i, i)).collect();
        for i in 50..60 {
            b.remove(&i);
        }
        assert_eq!(a, b);
    }

    #[test]
    fn debug_formats_as_map() {
        let m = ChainHashMap::from([(1, "one")]);
        assert_eq!(format!("{:?}", m), r#"{1: "one"}"#);
    }

    #[test]
    fn hasher_is_exposed() {
        let state = RandomState::new();
        let m: ChainHashMap<i32, i32> = ChainHashMap::with_hasher(state.clone());
        assert_eq!(m.hash_function().hash_one(7), state.hash_one(7));
        assert_eq!(m.hasher().hash_one(7), state.hash_one(7));
    }
}

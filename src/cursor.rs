//! Cursors and iterators over a `ChainHashMap`.
//!
//! Every traversal is a (bucket, node) position moved by the same rule:
//! follow the chain, and when it runs out continue at the next non-empty
//! bucket, stopping at the last bucket. The last bucket's one-past-the-end
//! position is the end sentinel. Order is bucket order, then insertion
//! order within a bucket; a resize may reorder everything.
//!
//! `Cursor` is a detached `Copy` handle in the style of a C++ iterator. It
//! borrows nothing, so validity is checked on use: a cursor created before a
//! resize, reset or clear carries an old epoch, and a cursor to a removed
//! entry fails the arena's generation check. Both report
//! [`MapError::StaleCursor`].

use crate::bucket_store::{step, BucketStore, Chain, Node, NodeKey, Position};
use crate::chain_hash_map::ChainHashMap;
use crate::error::{AtEndSnafu, MapError, StaleCursorSnafu};
use core::iter::FusedIterator;
use slotmap::{SecondaryMap, SlotMap};
use snafu::{ensure, OptionExt};

/// Position in a map. Two cursors are equal iff they name the same bucket
/// and node under the same table epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cursor {
    bucket: usize,
    node: Option<NodeKey>,
    epoch: u64,
}

impl Cursor {
    pub(crate) fn new((bucket, node): Position, epoch: u64) -> Self {
        Self {
            bucket,
            node,
            epoch,
        }
    }

    /// True for the end sentinel; it is the only position without an entry.
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    /// Bucket index this cursor points into.
    pub fn bucket(&self) -> usize {
        self.bucket
    }

    fn resolve<'a, K, V>(
        &self,
        store: &'a BucketStore<K, V>,
    ) -> Result<&'a Node<K, V>, MapError> {
        ensure!(self.epoch == store.epoch(), StaleCursorSnafu);
        let nk = self.node.context(AtEndSnafu)?;
        store.node(nk).context(StaleCursorSnafu)
    }

    /// The entry under the cursor. Fails with `StaleCursor` after a resize
    /// or removal of the entry, and with `AtEnd` on the end sentinel.
    pub fn entry<'a, K, V, S>(
        &self,
        map: &'a ChainHashMap<K, V, S>,
    ) -> Result<(&'a K, &'a V), MapError> {
        let node = self.resolve(map.store())?;
        Ok((&node.key, &node.value))
    }

    /// The key under the cursor; fails like [`Cursor::entry`].
    pub fn key<'a, K, V, S>(&self, map: &'a ChainHashMap<K, V, S>) -> Result<&'a K, MapError> {
        self.entry(map).map(|(k, _)| k)
    }

    /// The value under the cursor; `StaleCursor` or `AtEnd` as for `entry`.
    pub fn value<'a, K, V, S>(&self, map: &'a ChainHashMap<K, V, S>) -> Result<&'a V, MapError> {
        self.entry(map).map(|(_, v)| v)
    }

    /// Mutable access to the value; the key stays immutable.
    pub fn value_mut<'a, K, V, S>(
        &self,
        map: &'a mut ChainHashMap<K, V, S>,
    ) -> Result<&'a mut V, MapError> {
        let store = map.store_mut();
        ensure!(self.epoch == store.epoch(), StaleCursorSnafu);
        let nk = self.node.context(AtEndSnafu)?;
        store
            .node_mut(nk)
            .map(|n| &mut n.value)
            .context(StaleCursorSnafu)
    }

    /// The following position. Advancing from the last entry yields
    /// `end()`; advancing `end()` itself is an error.
    pub fn advance<K, V, S>(self, map: &ChainHashMap<K, V, S>) -> Result<Cursor, MapError> {
        let store = map.store();
        let node = self.resolve(store)?;
        Ok(Cursor::new(
            step(store.buckets(), self.bucket, node.next),
            self.epoch,
        ))
    }
}

/// Iterator over `(&K, &V)` in bucket order.
pub struct Iter<'a, K, V> {
    store: &'a BucketStore<K, V>,
    pos: Position,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(store: &'a BucketStore<K, V>) -> Self {
        Self {
            store,
            pos: store.begin(),
            remaining: store.len(),
        }
    }

    pub(crate) fn next_node(&mut self) -> Option<&'a Node<K, V>> {
        let (bucket, nk) = self.pos;
        let node = self.store.node(nk?)?;
        self.pos = step(self.store.buckets(), bucket, node.next);
        self.remaining -= 1;
        Some(node)
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            pos: self.pos,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.next_node().map(|n| (&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over `(&K, &mut V)` in bucket order.
///
/// The arena is split into per-node borrows up front; each step removes the
/// node it yields, so no entry is handed out twice.
pub struct IterMut<'a, K, V> {
    buckets: &'a [Chain],
    nodes: SecondaryMap<NodeKey, &'a mut Node<K, V>>,
    pos: Position,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(store: &'a mut BucketStore<K, V>) -> Self {
        let pos = store.begin();
        let (buckets, arena) = store.parts_mut();
        let mut nodes = SecondaryMap::with_capacity(arena.len());
        for (nk, node) in arena.iter_mut() {
            nodes.insert(nk, node);
        }
        Self {
            buckets,
            nodes,
            pos,
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let (bucket, nk) = self.pos;
        let node = self.nodes.remove(nk?)?;
        self.pos = step(self.buckets, bucket, node.next);
        Some((&node.key, &mut node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.nodes.len(), Some(self.nodes.len()))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Iterator over the keys in bucket order.
pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// Iterator over the values in bucket order.
pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

/// Iterator over mutable values in bucket order.
pub struct ValuesMut<'a, K, V> {
    pub(crate) inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// Owning iterator; yields entries in bucket order and drops the rest
/// with the iterator.
pub struct IntoIter<K, V> {
    buckets: Vec<Chain>,
    nodes: SlotMap<NodeKey, Node<K, V>>,
    pos: Position,
}

impl<K, V> IntoIter<K, V> {
    pub(crate) fn new(store: BucketStore<K, V>) -> Self {
        let (buckets, nodes, lead) = store.into_parts();
        let pos = (lead, buckets[lead].head);
        Self {
            buckets,
            nodes,
            pos,
        }
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let (bucket, nk) = self.pos;
        let node = self.nodes.remove(nk?)?;
        self.pos = step(&self.buckets, bucket, node.next);
        Some((node.key, node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.nodes.len(), Some(self.nodes.len()))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

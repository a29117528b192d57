//! BucketStore: the bucket array, its chains, and the resize mechanics.
//!
//! Entries live in a generational arena (`SlotMap`); a bucket is a singly
//! linked chain of arena keys. Appending to a chain never moves an existing
//! node, so a `NodeKey` stays valid until its entry is removed or the store
//! is reset. Rehashing relinks the same nodes into a new bucket array and
//! bumps `epoch`, which is what cursors check to detect a resize.

use crate::policy::{self, BASE_CAPACITY};
use crate::reentrancy::Reentrancy;
use core::borrow::Borrow;
use core::ops::{Index, IndexMut};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generational handle to one stored entry.
    pub(crate) struct NodeKey;
}

#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    /// Cached at insertion; rehash never calls `Hash` again.
    pub(crate) hash: u64,
    pub(crate) next: Option<NodeKey>,
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Chain {
    pub(crate) head: Option<NodeKey>,
    tail: Option<NodeKey>,
    len: usize,
}

/// A (bucket, node) position. `node == None` only occurs in the last bucket
/// and marks one-past-the-end.
pub(crate) type Position = (usize, Option<NodeKey>);

#[derive(Debug)]
pub(crate) struct BucketStore<K, V> {
    nodes: SlotMap<NodeKey, Node<K, V>>,
    buckets: Vec<Chain>,
    // First non-empty bucket, or the last bucket when empty.
    lead: usize,
    epoch: u64,
    reentrancy: Reentrancy,
}

/// Walk the chain for `q`.
fn probe<K, V, Q>(nodes: &SlotMap<NodeKey, Node<K, V>>, chain: &Chain, q: &Q) -> Option<NodeKey>
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
{
    let mut cur = chain.head;
    while let Some(nk) = cur {
        let node = &nodes[nk];
        if node.key.borrow() == q {
            return Some(nk);
        }
        cur = node.next;
    }
    None
}

fn link_tail<K, V>(
    nodes: &mut SlotMap<NodeKey, Node<K, V>>,
    chain: &mut Chain,
    nk: NodeKey,
) {
    nodes[nk].next = None;
    match chain.tail {
        Some(t) => nodes[t].next = Some(nk),
        None => chain.head = Some(nk),
    }
    chain.tail = Some(nk);
    chain.len += 1;
}

/// First position at or after bucket `from`, skipping empty buckets but
/// never moving past the last one.
pub(crate) fn first_from(buckets: &[Chain], from: usize) -> Position {
    let last = buckets.len() - 1;
    let mut b = from.min(last);
    while b < last && buckets[b].head.is_none() {
        b += 1;
    }
    (b, buckets[b].head)
}

/// Position following the node in `bucket` whose successor link is `next`.
pub(crate) fn step(buckets: &[Chain], bucket: usize, next: Option<NodeKey>) -> Position {
    if next.is_some() {
        return (bucket, next);
    }
    let last = buckets.len() - 1;
    if bucket >= last {
        (last, None)
    } else {
        first_from(buckets, bucket + 1)
    }
}

impl<K, V> BucketStore<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            nodes: SlotMap::with_key(),
            buckets: vec![Chain::default(); capacity],
            lead: capacity - 1,
            epoch: 0,
            reentrancy: Reentrancy::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn bucket_len(&self, bucket: usize) -> Option<usize> {
        self.buckets.get(bucket).map(|c| c.len)
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    pub(crate) fn buckets(&self) -> &[Chain] {
        &self.buckets
    }

    pub(crate) fn node(&self, nk: NodeKey) -> Option<&Node<K, V>> {
        self.nodes.get(nk)
    }

    pub(crate) fn node_mut(&mut self, nk: NodeKey) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(nk)
    }

    /// Split borrow used by `IterMut`.
    pub(crate) fn parts_mut(&mut self) -> (&[Chain], &mut SlotMap<NodeKey, Node<K, V>>) {
        (&self.buckets, &mut self.nodes)
    }

    /// Consume the store into its raw parts, used by the owning iterator.
    pub(crate) fn into_parts(self) -> (Vec<Chain>, SlotMap<NodeKey, Node<K, V>>, usize) {
        (self.buckets, self.nodes, self.lead)
    }

    pub(crate) fn begin(&self) -> Position {
        (self.lead, self.buckets[self.lead].head)
    }

    pub(crate) fn end(&self) -> Position {
        (self.buckets.len() - 1, None)
    }

    pub(crate) fn lookup<Q>(&self, hash: u64, q: &Q) -> Option<(usize, NodeKey)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let _g = self.reentrancy.enter();
        let bucket = self.bucket_of(hash);
        probe(&self.nodes, &self.buckets[bucket], q).map(|nk| (bucket, nk))
    }

    /// Insert `key` unless already present. `value` only runs on insert.
    /// Returns the entry's node and whether it was newly created; the node
    /// key remains valid even if the insert triggered a grow.
    pub(crate) fn insert_with<F>(&mut self, hash: u64, key: K, value: F) -> (NodeKey, bool)
    where
        K: Eq,
        F: FnOnce() -> V,
    {
        let g = self.reentrancy.enter();
        let bucket = self.bucket_of(hash);
        if let Some(nk) = probe(&self.nodes, &self.buckets[bucket], &key) {
            return (nk, false);
        }
        let nk = self.nodes.insert(Node {
            key,
            value: value(),
            hash,
            next: None,
        });
        link_tail(&mut self.nodes, &mut self.buckets[bucket], nk);
        if bucket < self.lead {
            self.lead = bucket;
        }
        drop(g);

        if let Some(target) = policy::grow_target(self.len(), self.capacity()) {
            self.rehash(target);
        }
        (nk, true)
    }

    /// Unlink and return the entry for `q`. Emptying the store resets it to
    /// `BASE_CAPACITY`; otherwise the shrink policy is consulted.
    pub(crate) fn remove<Q>(&mut self, hash: u64, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let g = self.reentrancy.enter();
        let bucket = self.bucket_of(hash);
        let chain = &mut self.buckets[bucket];
        let mut prev: Option<NodeKey> = None;
        let mut cur = chain.head;
        while let Some(nk) = cur {
            if self.nodes[nk].key.borrow() == q {
                break;
            }
            prev = Some(nk);
            cur = self.nodes[nk].next;
        }
        let nk = cur?;

        let next = self.nodes[nk].next;
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => chain.head = next,
        }
        if chain.tail == Some(nk) {
            chain.tail = prev;
        }
        chain.len -= 1;
        let node = self.nodes.remove(nk)?;
        drop(g);

        if self.nodes.is_empty() {
            log::trace!("last entry removed, resetting to {} buckets", BASE_CAPACITY);
            self.reset(BASE_CAPACITY);
        } else {
            let last = self.buckets.len() - 1;
            while self.lead < last && self.buckets[self.lead].head.is_none() {
                self.lead += 1;
            }
            if let Some(target) = policy::shrink_target(self.len(), self.capacity()) {
                self.rehash(target);
            }
        }
        Some((node.key, node.value))
    }

    /// Relink every node into a fresh array of `capacity` buckets, visiting
    /// them in current iteration order.
    pub(crate) fn rehash(&mut self, capacity: usize) {
        let _g = self.reentrancy.enter();
        let capacity = capacity.max(1);
        log::debug!(
            "rehashing {} entries: {} -> {} buckets",
            self.nodes.len(),
            self.buckets.len(),
            capacity
        );

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut pos = self.begin();
        while let (bucket, Some(nk)) = pos {
            order.push(nk);
            pos = step(&self.buckets, bucket, self.nodes[nk].next);
        }
        debug_assert_eq!(order.len(), self.nodes.len());

        let mut buckets = vec![Chain::default(); capacity];
        let mut lead = capacity - 1;
        for nk in order {
            let bucket = (self.nodes[nk].hash % capacity as u64) as usize;
            link_tail(&mut self.nodes, &mut buckets[bucket], nk);
            lead = lead.min(bucket);
        }
        self.buckets = buckets;
        self.lead = lead;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Drop every entry and start over with `capacity` empty buckets.
    pub(crate) fn reset(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        self.nodes.clear();
        self.buckets.clear();
        self.buckets.resize(capacity, Chain::default());
        self.lead = capacity - 1;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Check the structural invariants; used by tests.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert!(!self.buckets.is_empty(), "capacity must stay >= 1");
        let mut total = 0;
        for (i, chain) in self.buckets.iter().enumerate() {
            let mut n = 0;
            let mut tail = None;
            let mut cur = chain.head;
            while let Some(nk) = cur {
                let node = &self.nodes[nk];
                assert_eq!(self.bucket_of(node.hash), i, "node in wrong bucket");
                tail = Some(nk);
                cur = node.next;
                n += 1;
            }
            assert_eq!(n, chain.len, "chain length out of sync");
            assert_eq!(tail, chain.tail, "tail out of sync");
            total += n;
        }
        assert_eq!(total, self.nodes.len(), "count does not reconcile");
        let expected_lead = self
            .buckets
            .iter()
            .position(|c| c.head.is_some())
            .unwrap_or(self.buckets.len() - 1);
        assert_eq!(self.lead, expected_lead, "lead bucket out of sync");
    }
}

// Indexing is for keys the store itself handed out and that are known live.
impl<K, V> Index<NodeKey> for BucketStore<K, V> {
    type Output = Node<K, V>;

    fn index(&self, nk: NodeKey) -> &Node<K, V> {
        &self.nodes[nk]
    }
}

impl<K, V> IndexMut<NodeKey> for BucketStore<K, V> {
    fn index_mut(&mut self, nk: NodeKey) -> &mut Node<K, V> {
        &mut self.nodes[nk]
    }
}

//! Resize policy: when the bucket array grows or shrinks, and to what size.
//!
//! Growth fires when `count * GROW_FACTOR > capacity` and doubles the bucket
//! array. Shrinking fires when `capacity > GROW_FACTOR^2 * count` and halves
//! it. The squared threshold leaves a wide band between the two triggers so
//! alternating insert/remove around one boundary does not rehash every time.
//! An empty table is not shrunk here; the store resets it to
//! `BASE_CAPACITY` directly.

/// Number of buckets in a fresh or reset table.
pub const BASE_CAPACITY: usize = 10;

/// Multiplier applied on growth and divisor applied on shrink.
pub const GROW_FACTOR: usize = 2;

/// New capacity after an insert brought the table to `count` entries, or
/// `None` when the load factor is still acceptable.
#[inline]
pub fn grow_target(count: usize, capacity: usize) -> Option<usize> {
    if count.saturating_mul(GROW_FACTOR) > capacity {
        Some(capacity.saturating_mul(GROW_FACTOR))
    } else {
        None
    }
}

/// New capacity after a remove left `count` entries, or `None` when the
/// table is not sparse enough. Never fires for `count == 0`.
#[inline]
pub fn shrink_target(count: usize, capacity: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    if capacity > count.saturating_mul(GROW_FACTOR * GROW_FACTOR) {
        Some((capacity / GROW_FACTOR).max(1))
    } else {
        None
    }
}

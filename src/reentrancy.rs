//! Debug-only guard against user code re-entering a map mid-probe.
//!
//! Probing a chain calls `K: Eq`, which is user code and could, through raw
//! pointers or interior mutability, call back into the same map while a
//! chain is half-linked. Debug builds panic on such nesting. Release builds
//! keep only a zero-sized marker.

use core::cell::Cell;
use core::marker::PhantomData;

/// Embedded once per bucket store; guarded sections begin with
/// `let _g = self.reentrancy.enter();`.
#[derive(Debug, Default)]
pub(crate) struct Reentrancy {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    // Same auto traits in every build profile: Send, never Sync.
    _not_sync: PhantomData<Cell<()>>,
}

impl Reentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            _not_sync: PhantomData,
        }
    }

    /// Mark the start of a guarded section. Panics in debug builds when a
    /// section is already open on this instance.
    #[inline]
    pub(crate) fn enter(&self) -> Entered<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "reentrancy detected: map accessed from its own Eq code"
            );
        }
        Entered { owner: self }
    }
}

/// Closes the guarded section on drop.
pub(crate) struct Entered<'a> {
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    owner: &'a Reentrancy,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.busy.set(false);
    }
}

//! Error conditions surfaced by `ChainHashMap`.

use snafu::Snafu;

#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum MapError {
    /// Strict lookup (`at`) on a key that is not stored.
    #[snafu(display("key not found"))]
    KeyNotFound,

    /// The cursor predates a resize, reset or clear, or its entry was removed.
    #[snafu(display("cursor was invalidated by a structural change to the map"))]
    StaleCursor,

    /// The `end()` cursor was advanced or dereferenced.
    #[snafu(display("cursor is positioned at the end of the map"))]
    AtEnd,
}

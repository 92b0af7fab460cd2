//! Tile source observer.

/// Receives "the resident tile set changed" notifications.
///
/// Called at most once per processed batch (a visible-bounds update, or a run
/// of load completions that arrived back to back), never while the source is
/// paused. The callback runs inside the tile source's mailbox: it should only
/// record that a redraw is needed and return. Reading
/// [`TileSource::current_tiles`](super::TileSource::current_tiles) from here
/// is fine; it never goes through the mailbox.
pub trait TileSourceListener: Send + Sync {
    fn on_tiles_updated(&self);
}

impl<F> TileSourceListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_tiles_updated(&self) {
        self()
    }
}

//! Tile identity and prioritized requests.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a tile: column, row and zoom level.
///
/// The numeric `zoom` of the level is carried along because a layer's zoom
/// table need not be uniform. Equality, ordering and hashing are structural;
/// the float is compared by its total order so the type can key sets and maps.
#[derive(Debug, Clone, Copy)]
pub struct TileCoordinate {
    /// Column index.
    pub x: i32,
    /// Row index.
    pub y: i32,
    /// Layer-defined identifier of the zoom level (e.g. 0..=20 for OSM).
    pub zoom_identifier: i32,
    /// Nominal zoom (scale) of the level.
    pub zoom: f64,
}

impl TileCoordinate {
    pub fn new(x: i32, y: i32, zoom_identifier: i32, zoom: f64) -> Self {
        Self {
            x,
            y,
            zoom_identifier,
            zoom,
        }
    }
}

impl PartialEq for TileCoordinate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TileCoordinate {}

impl PartialOrd for TileCoordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TileCoordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.zoom_identifier
            .cmp(&other.zoom_identifier)
            .then_with(|| self.x.cmp(&other.x))
            .then_with(|| self.y.cmp(&other.y))
            .then_with(|| self.zoom.total_cmp(&other.zoom))
    }
}

impl Hash for TileCoordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.zoom_identifier.hash(state);
        self.x.hash(state);
        self.y.hash(state);
        self.zoom.to_bits().hash(state);
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom_identifier, self.x, self.y)
    }
}

/// A tile plus its load priority. Lower priority values load first.
///
/// Ordered by priority, then by tile, which makes the pending queue a strict
/// total order with deterministic tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrioritizedTileRequest {
    pub priority: u32,
    pub tile: TileCoordinate,
}

impl PrioritizedTileRequest {
    pub fn new(tile: TileCoordinate, priority: u32) -> Self {
        Self { priority, tile }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    fn tile(x: i32, y: i32, z: i32) -> TileCoordinate {
        TileCoordinate::new(x, y, z, 1000.0 / f64::from(z + 1))
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(tile(1, 2, 3), tile(1, 2, 3));
        assert_ne!(tile(1, 2, 3), tile(2, 1, 3));
        assert_ne!(
            TileCoordinate::new(0, 0, 1, 10.0),
            TileCoordinate::new(0, 0, 1, 20.0)
        );
    }

    #[test]
    fn test_hash_matches_equality() {
        let mut set = HashSet::new();
        set.insert(tile(1, 1, 1));
        set.insert(tile(1, 1, 1));
        set.insert(tile(1, 2, 1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_request_orders_by_priority_then_tile() {
        let mut queue = BTreeSet::new();
        queue.insert(PrioritizedTileRequest::new(tile(5, 5, 2), 3));
        queue.insert(PrioritizedTileRequest::new(tile(0, 1, 2), 1));
        queue.insert(PrioritizedTileRequest::new(tile(0, 0, 2), 1));

        let order: Vec<_> = queue.iter().map(|r| (r.priority, r.tile.x, r.tile.y)).collect();
        assert_eq!(order, vec![(1, 0, 0), (1, 0, 1), (3, 5, 5)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(tile(4, 7, 12).to_string(), "12/4/7");
    }
}

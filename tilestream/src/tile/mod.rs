//! Tile geometry: coordinates, zoom tables and grid computation.
//!
//! Everything here is pure data and pure functions. The tile source feeds
//! [`compute_visible_tiles`] with visible bounds already converted into the
//! layer's coordinate system and diffs the result against its loading state.

mod coord;
mod coordinate;
mod grid;
mod zoom;

pub use coord::{systems, Coord, RectCoord};
pub use coordinate::{PrioritizedTileRequest, TileCoordinate};
pub use grid::{compute_visible_tiles, GridRequest, VisibleTile};
pub use zoom::{select_target_level, sort_zoom_levels, ZoomInfo, ZoomLevelInfo};

//! Viewport to tile grid computation.
//!
//! Maps visible bounds (already in the layer's coordinate system) and a zoom
//! value onto the tiles of the matching zoom level, each with a distance-based
//! priority.
//!
//! # Index range
//!
//! ```text
//!  origin ──► x
//!    │   ┌────┬────┬────┬────┐
//!    ▼   │    │    │    │    │      start = floor(max(offset_start, 0) / W)
//!    y   ├────┼────╔════╗────┤      end   = ceil(offset_end / W)
//!        │    │    ║view║    │
//!        ├────┼────╚════╝────┤      x in [start, end) ∩ [0, num_tiles_x)
//!        │    │    │    │    │
//!        └────┴────┴────┴────┘
//! ```
//!
//! Offsets are measured from the level's top-left corner along the level's
//! own axis directions, so grids growing downwards (screen-like) and upwards
//! (Web Mercator) are handled the same way.
//!
//! # Priority
//!
//! Within one level, priority is the tile-center distance to the view center
//! normalized into `priority_buckets` buckets (0 = the center tile). Coarser
//! levels drawn underneath the target level add `buckets * rank` so every
//! target-level tile loads before any fallback tile of the same rank.

use super::coord::{Coord, RectCoord};
use super::coordinate::{PrioritizedTileRequest, TileCoordinate};
use super::zoom::{select_target_level, ZoomInfo, ZoomLevelInfo};

/// A candidate tile with its request priority and placement bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleTile {
    pub request: PrioritizedTileRequest,
    pub bounds: RectCoord,
}

impl VisibleTile {
    pub fn tile(&self) -> TileCoordinate {
        self.request.tile
    }

    pub fn priority(&self) -> u32 {
        self.request.priority
    }
}

/// Inputs of [`compute_visible_tiles`].
#[derive(Debug, Clone)]
pub struct GridRequest<'a> {
    /// Visible bounds in the layer's coordinate system.
    pub visible_bounds: RectCoord,
    /// Current zoom (scale) of the viewport.
    pub zoom: f64,
    /// Zoom table sorted coarsest first.
    pub levels: &'a [ZoomLevelInfo],
    pub zoom_info: ZoomInfo,
    pub priority_buckets: u32,
    /// Levels with a smaller identifier are skipped.
    pub min_zoom_identifier: Option<i32>,
    /// Levels with a larger identifier are skipped.
    pub max_zoom_identifier: Option<i32>,
}

impl GridRequest<'_> {
    fn allows(&self, level: &ZoomLevelInfo) -> bool {
        self.min_zoom_identifier
            .map_or(true, |min| level.zoom_identifier >= min)
            && self
                .max_zoom_identifier
                .map_or(true, |max| level.zoom_identifier <= max)
    }
}

/// Computes the tiles covering the visible bounds.
///
/// # Returns
///
/// Tiles of the target level plus up to `num_draw_previous_layers` coarser
/// levels. A zoom at or past the finest level uses the finest level. Only
/// empty bounds or an empty table yield an empty set. Indices are always
/// clamped to the level's grid.
pub fn compute_visible_tiles(request: &GridRequest<'_>) -> Vec<VisibleTile> {
    if request.visible_bounds.is_empty() || !request.zoom.is_finite() {
        return Vec::new();
    }

    let Some(target) = select_target_level(request.levels, request.zoom, &request.zoom_info) else {
        return Vec::new();
    };
    let start = target.saturating_sub(request.zoom_info.num_draw_previous_layers);
    let buckets = request.priority_buckets.max(1);

    let mut tiles = Vec::new();
    for (index, level) in request.levels[start..=target].iter().enumerate() {
        if !request.allows(level) {
            continue;
        }
        let rank = (target - start - index) as u32;
        tiles_for_level(
            level,
            &request.visible_bounds,
            buckets,
            rank.saturating_mul(buckets),
            &mut tiles,
        );
    }
    tiles
}

/// One axis of a level grid.
struct Axis {
    origin: f64,
    /// +1 if indices grow with the coordinate, -1 otherwise.
    direction: f64,
}

impl Axis {
    fn new(origin: f64, other: f64) -> Self {
        Self {
            origin,
            direction: if origin <= other { 1.0 } else { -1.0 },
        }
    }

    /// Half-open index range covering `[lo, hi]`, clamped to `[0, count)`.
    fn index_range(&self, lo: f64, hi: f64, tile_width: f64, count: i32) -> (i32, i32) {
        let (near, far) = if self.direction > 0.0 {
            (lo - self.origin, hi - self.origin)
        } else {
            (self.origin - hi, self.origin - lo)
        };
        let count = f64::from(count.max(0));
        let start = (near.max(0.0) / tile_width).floor().min(count);
        let end = (far / tile_width).ceil().clamp(0.0, count);
        (start as i32, end as i32)
    }

    fn position(&self, index: i32, tile_width: f64) -> f64 {
        self.origin + self.direction * f64::from(index) * tile_width
    }
}

fn tiles_for_level(
    level: &ZoomLevelInfo,
    visible: &RectCoord,
    buckets: u32,
    priority_offset: u32,
    out: &mut Vec<VisibleTile>,
) {
    let tile_width = level.tile_width;
    if !(tile_width.is_finite() && tile_width > 0.0) {
        return;
    }

    let system_id = visible.system_id();
    let x_axis = Axis::new(level.bounds.top_left.x, level.bounds.bottom_right.x);
    let y_axis = Axis::new(level.bounds.top_left.y, level.bounds.bottom_right.y);

    let (min_x, max_x) = visible.x_range();
    let (min_y, max_y) = visible.y_range();
    let (start_x, end_x) = x_axis.index_range(min_x, max_x, tile_width, level.num_tiles_x);
    let (start_y, end_y) = y_axis.index_range(min_y, max_y, tile_width, level.num_tiles_y);

    let center = visible.center();
    let max_dx = visible.width() * 0.5 + tile_width;
    let max_dy = visible.height() * 0.5 + tile_width;
    let max_distance = max_dx.hypot(max_dy);

    for x in start_x..end_x {
        for y in start_y..end_y {
            let left = x_axis.position(x, tile_width);
            let top = y_axis.position(y, tile_width);
            let right = x_axis.position(x + 1, tile_width);
            let bottom = y_axis.position(y + 1, tile_width);

            let tile_center_x = 0.5 * (left + right);
            let tile_center_y = 0.5 * (top + bottom);
            let distance = (tile_center_x - center.x).hypot(tile_center_y - center.y);
            let bucket = ((distance / max_distance) * f64::from(buckets))
                .ceil()
                .clamp(0.0, f64::from(buckets)) as u32;

            out.push(VisibleTile {
                request: PrioritizedTileRequest::new(
                    TileCoordinate::new(x, y, level.zoom_identifier, level.zoom),
                    bucket.saturating_add(priority_offset),
                ),
                bounds: RectCoord::new(
                    Coord::new(system_id, left, top),
                    Coord::new(system_id, right, bottom),
                ),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::coord::systems::EPSG_3857;
    use crate::tile::zoom::sort_zoom_levels;
    use proptest::prelude::*;

    const EXTENT: f64 = 1024.0;

    /// Quadtree table with `count` levels over a square `EXTENT` wide, y up.
    fn quadtree(count: i32) -> Vec<ZoomLevelInfo> {
        let mut levels: Vec<_> = (0..count)
            .map(|i| {
                let tiles = 1 << i;
                ZoomLevelInfo {
                    zoom: 1000.0 / f64::from(tiles),
                    tile_width: EXTENT / f64::from(tiles),
                    num_tiles_x: tiles,
                    num_tiles_y: tiles,
                    zoom_identifier: i,
                    bounds: RectCoord::from_corners(EPSG_3857, 0.0, EXTENT, EXTENT, 0.0),
                }
            })
            .collect();
        sort_zoom_levels(&mut levels);
        levels
    }

    fn request(levels: &[ZoomLevelInfo], bounds: RectCoord, zoom: f64) -> GridRequest<'_> {
        GridRequest {
            visible_bounds: bounds,
            zoom,
            levels,
            zoom_info: ZoomInfo::default(),
            priority_buckets: 20,
            min_zoom_identifier: None,
            max_zoom_identifier: None,
        }
    }

    fn rect(left: f64, top: f64, right: f64, bottom: f64) -> RectCoord {
        RectCoord::from_corners(EPSG_3857, left, top, right, bottom)
    }

    #[test]
    fn test_single_tile_bounds_yield_one_tile_at_priority_zero() {
        let levels = vec![ZoomLevelInfo {
            zoom: 500.0,
            tile_width: 256.0,
            num_tiles_x: 4,
            num_tiles_y: 4,
            zoom_identifier: 2,
            bounds: rect(0.0, 0.0, 1024.0, 1024.0),
        }];
        let tiles = compute_visible_tiles(&request(&levels, rect(256.0, 512.0, 512.0, 768.0), 1000.0));

        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].priority(), 0);
        assert_eq!(tiles[0].tile(), TileCoordinate::new(1, 2, 2, 500.0));
        assert_eq!(tiles[0].bounds, rect(256.0, 512.0, 512.0, 768.0));
    }

    #[test]
    fn test_y_up_grid_counts_rows_from_top() {
        let levels = quadtree(3);
        // Top-left quarter of the world at level 1.
        let tiles = compute_visible_tiles(&request(&levels, rect(0.0, EXTENT, 512.0, 512.0), 600.0));

        assert_eq!(tiles.len(), 1);
        let tile = tiles[0].tile();
        assert_eq!((tile.x, tile.y, tile.zoom_identifier), (0, 0, 1));
        assert_eq!(tiles[0].bounds, rect(0.0, EXTENT, 512.0, 512.0));
    }

    #[test]
    fn test_center_tile_has_lowest_priority() {
        let levels = quadtree(4);
        // 3x3 tiles at level 3 (tile width 128).
        let tiles = compute_visible_tiles(&request(&levels, rect(128.0, 512.0, 512.0, 128.0), 130.0));

        assert_eq!(tiles.len(), 9);
        let best = tiles.iter().min_by_key(|t| t.priority()).map(|t| t.tile());
        assert_eq!(best.map(|t| (t.x, t.y)), Some((2, 5)));
        assert!(tiles.iter().all(|t| t.priority() <= 20));
    }

    #[test]
    fn test_bounds_outside_world_are_clamped() {
        let levels = quadtree(2);
        let tiles = compute_visible_tiles(&request(&levels, rect(-5000.0, 5000.0, 5000.0, -5000.0), 600.0));

        assert_eq!(tiles.len(), 4);
        for tile in &tiles {
            assert!((0..2).contains(&tile.tile().x));
            assert!((0..2).contains(&tile.tile().y));
        }
    }

    #[test]
    fn test_empty_bounds_yield_nothing() {
        let levels = quadtree(2);
        assert!(compute_visible_tiles(&request(&levels, rect(10.0, 10.0, 10.0, 0.0), 600.0)).is_empty());
    }

    #[test]
    fn test_zoom_past_finest_level_uses_finest_level() {
        let levels = quadtree(3);
        let world = rect(0.0, EXTENT, EXTENT, 0.0);

        // Level 2 has nominal zoom 250.
        for zoom in [250.0, 100.0, 1.0] {
            let tiles = compute_visible_tiles(&request(&levels, world, zoom));
            assert_eq!(tiles.len(), 16, "zoom {}", zoom);
            assert!(tiles.iter().all(|t| t.tile().zoom_identifier == 2));
        }
    }

    #[test]
    fn test_empty_table_yields_nothing() {
        assert!(compute_visible_tiles(&request(&[], rect(0.0, EXTENT, EXTENT, 0.0), 600.0)).is_empty());
    }

    #[test]
    fn test_previous_layers_sort_after_target() {
        let levels = quadtree(3);
        let mut req = request(&levels, rect(0.0, EXTENT, EXTENT, 0.0), 300.0);
        req.zoom_info = ZoomInfo::default().with_previous_layers(2);

        let tiles = compute_visible_tiles(&req);
        let target_max = tiles
            .iter()
            .filter(|t| t.tile().zoom_identifier == 2)
            .map(|t| t.priority())
            .max();
        let previous_min = tiles
            .iter()
            .filter(|t| t.tile().zoom_identifier < 2)
            .map(|t| t.priority())
            .min();

        assert_eq!(tiles.len(), 16 + 4 + 1);
        assert!(target_max < previous_min);
        let root = tiles.iter().find(|t| t.tile().zoom_identifier == 0).map(|t| t.priority());
        assert_eq!(root, Some(40));
    }

    #[test]
    fn test_identifier_window_skips_levels() {
        let levels = quadtree(3);
        let mut req = request(&levels, rect(0.0, EXTENT, EXTENT, 0.0), 300.0);
        req.zoom_info = ZoomInfo::default().with_previous_layers(2);
        req.min_zoom_identifier = Some(1);
        req.max_zoom_identifier = Some(1);

        let tiles = compute_visible_tiles(&req);
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|t| t.tile().zoom_identifier == 1));
    }

    proptest! {
        #[test]
        fn prop_indices_within_grid(
            x in -2000.0f64..3000.0,
            y in -2000.0f64..3000.0,
            w in 0.0f64..4000.0,
            h in 0.0f64..4000.0,
            zoom in 0.0f64..3000.0,
            previous in 0usize..4,
        ) {
            let levels = quadtree(5);
            let mut req = request(&levels, rect(x, y + h, x + w, y), zoom);
            req.zoom_info = ZoomInfo::default().with_previous_layers(previous);

            for tile in compute_visible_tiles(&req) {
                let level = levels
                    .iter()
                    .find(|l| l.zoom_identifier == tile.tile().zoom_identifier)
                    .cloned();
                prop_assert!(level.is_some());
                let level = level.unwrap_or_else(|| levels[0].clone());
                prop_assert!(tile.tile().x >= 0 && tile.tile().x < level.num_tiles_x);
                prop_assert!(tile.tile().y >= 0 && tile.tile().y < level.num_tiles_y);
            }
        }
    }
}

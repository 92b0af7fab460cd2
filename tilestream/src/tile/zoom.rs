//! Zoom level tables.

use super::coord::RectCoord;

/// One entry of a layer's zoom table.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomLevelInfo {
    /// Nominal zoom (scale denominator). Larger values are coarser.
    pub zoom: f64,
    /// Tile edge length in layer system units.
    pub tile_width: f64,
    pub num_tiles_x: i32,
    pub num_tiles_y: i32,
    /// Layer-defined identifier used in tile keys.
    pub zoom_identifier: i32,
    /// Extent of the level; the top-left corner is the grid origin and the
    /// corner order gives the axis directions.
    pub bounds: RectCoord,
}

/// Layer-wide zoom behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomInfo {
    /// Multiplies each nominal zoom before level selection.
    pub zoom_level_scale_factor: f64,
    /// Number of coarser levels drawn below the target level.
    pub num_draw_previous_layers: usize,
}

impl Default for ZoomInfo {
    fn default() -> Self {
        Self {
            zoom_level_scale_factor: 1.0,
            num_draw_previous_layers: 0,
        }
    }
}

impl ZoomInfo {
    pub fn with_scale_factor(mut self, factor: f64) -> Self {
        self.zoom_level_scale_factor = factor;
        self
    }

    pub fn with_previous_layers(mut self, layers: usize) -> Self {
        self.num_draw_previous_layers = layers;
        self
    }
}

/// Sorts a zoom table by decreasing nominal zoom (coarsest first).
pub fn sort_zoom_levels(levels: &mut [ZoomLevelInfo]) {
    levels.sort_by(|a, b| b.zoom.total_cmp(&a.zoom));
}

/// Selects the target level index in a table sorted by [`sort_zoom_levels`].
///
/// Returns the first level whose scaled nominal zoom is below `zoom`. A zoom
/// at or past the finest level selects the finest level. `None` only for an
/// empty table.
pub fn select_target_level(levels: &[ZoomLevelInfo], zoom: f64, zoom_info: &ZoomInfo) -> Option<usize> {
    levels
        .iter()
        .position(|level| zoom_info.zoom_level_scale_factor * level.zoom < zoom)
        .or_else(|| levels.len().checked_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::coord::RectCoord;

    fn level(zoom: f64, identifier: i32) -> ZoomLevelInfo {
        ZoomLevelInfo {
            zoom,
            tile_width: 100.0,
            num_tiles_x: 1,
            num_tiles_y: 1,
            zoom_identifier: identifier,
            bounds: RectCoord::from_corners(0, 0.0, 0.0, 100.0, 100.0),
        }
    }

    fn table() -> Vec<ZoomLevelInfo> {
        let mut levels = vec![level(250.0, 2), level(1000.0, 0), level(500.0, 1)];
        sort_zoom_levels(&mut levels);
        levels
    }

    #[test]
    fn test_sort_coarsest_first() {
        let ids: Vec<_> = table().iter().map(|l| l.zoom_identifier).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_select_first_level_below_zoom() {
        let levels = table();
        let info = ZoomInfo::default();
        assert_eq!(select_target_level(&levels, 2000.0, &info), Some(0));
        assert_eq!(select_target_level(&levels, 600.0, &info), Some(1));
        assert_eq!(select_target_level(&levels, 300.0, &info), Some(2));
    }

    #[test]
    fn test_select_finest_when_zoomed_past_table() {
        let levels = table();
        let info = ZoomInfo::default();
        assert_eq!(select_target_level(&levels, 250.0, &info), Some(2));
        assert_eq!(select_target_level(&levels, 100.0, &info), Some(2));
        assert_eq!(select_target_level(&levels, 0.0, &info), Some(2));
    }

    #[test]
    fn test_select_none_for_empty_table() {
        assert_eq!(select_target_level(&[], 100.0, &ZoomInfo::default()), None);
    }

    #[test]
    fn test_scale_factor_shifts_selection() {
        let levels = table();
        let info = ZoomInfo::default().with_scale_factor(0.5);
        // 0.5 * 1000 = 500 < 600
        assert_eq!(select_target_level(&levels, 600.0, &info), Some(0));
    }
}

//! Web Mercator (EPSG:3857) quadtree layers.
//!
//! # Grid
//!
//! Level `i` splits the world square into `2^i x 2^i` tiles. The grid origin
//! is the north-west corner, columns grow eastwards and rows southwards:
//!
//! ```text
//! (-E, +E) ┌─────────┬─────────┐
//!          │  1/0/0  │  1/1/0  │        E = 20037508.34 m
//!          ├─────────┼─────────┤
//!          │  1/0/1  │  1/1/1  │
//!          └─────────┴─────────┘ (+E, -E)
//! ```
//!
//! The nominal zoom of level `i` is `BASE_ZOOM / 2^i`, a map scale
//! denominator.

use super::config::{LayerConfig, UrlTemplate};
use crate::error::LayerConfigError;
use crate::tile::{systems, Coord, RectCoord, TileCoordinate, ZoomInfo, ZoomLevelInfo};

/// Half the side of the Web Mercator world square, in metres.
pub const WEB_MERCATOR_EXTENT: f64 = 20_037_508.34;

/// Scale denominator of level 0.
pub const BASE_ZOOM: f64 = 559_082_264.029;

/// Tile width of level 0, in metres.
pub const BASE_TILE_WIDTH: f64 = 40_075_016.0;

/// Deepest supported level.
pub const MAX_ZOOM_LEVEL: i32 = 30;

/// Default deepest level of a new layer.
pub const DEFAULT_MAX_ZOOM_LEVEL: i32 = 20;

/// Standard XYZ layer over the Web Mercator world square.
#[derive(Debug, Clone)]
pub struct WebMercatorLayerConfig {
    name: String,
    template: UrlTemplate,
    zoom_info: ZoomInfo,
    min_zoom_level: i32,
    max_zoom_level: i32,
}

impl WebMercatorLayerConfig {
    /// Creates a layer serving levels `0..=DEFAULT_MAX_ZOOM_LEVEL`.
    ///
    /// # Arguments
    ///
    /// * `name` - Layer name used in logs
    /// * `url_template` - Key template containing `{z}`, `{x}` and `{y}`
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
    ) -> Result<Self, LayerConfigError> {
        Ok(Self {
            name: name.into(),
            template: UrlTemplate::parse(url_template.into())?,
            zoom_info: ZoomInfo::default(),
            min_zoom_level: 0,
            max_zoom_level: DEFAULT_MAX_ZOOM_LEVEL,
        })
    }

    /// Restricts the served levels to `min..=max`.
    pub fn with_zoom_range(mut self, min: i32, max: i32) -> Result<Self, LayerConfigError> {
        if min < 0 || min > max || max > MAX_ZOOM_LEVEL {
            return Err(LayerConfigError::InvalidZoomRange {
                min,
                max,
                limit: MAX_ZOOM_LEVEL,
            });
        }
        self.min_zoom_level = min;
        self.max_zoom_level = max;
        Ok(self)
    }

    pub fn with_zoom_info(mut self, zoom_info: ZoomInfo) -> Self {
        self.zoom_info = zoom_info;
        self
    }

    /// The world square, north-west corner first.
    pub fn world_bounds() -> RectCoord {
        RectCoord::new(
            Coord::new(systems::EPSG_3857, -WEB_MERCATOR_EXTENT, WEB_MERCATOR_EXTENT),
            Coord::new(systems::EPSG_3857, WEB_MERCATOR_EXTENT, -WEB_MERCATOR_EXTENT),
        )
    }

    /// Nominal zoom of a level.
    pub fn zoom_for_level(level: i32) -> f64 {
        BASE_ZOOM / tile_count(level)
    }
}

fn tile_count(level: i32) -> f64 {
    2f64.powi(level)
}

impl LayerConfig for WebMercatorLayerConfig {
    fn layer_name(&self) -> &str {
        &self.name
    }

    fn coordinate_system(&self) -> i32 {
        systems::EPSG_3857
    }

    fn zoom_levels(&self) -> Vec<ZoomLevelInfo> {
        let bounds = Self::world_bounds();
        (self.min_zoom_level..=self.max_zoom_level)
            .map(|level| {
                let count = tile_count(level);
                ZoomLevelInfo {
                    zoom: BASE_ZOOM / count,
                    tile_width: BASE_TILE_WIDTH / count,
                    num_tiles_x: 1 << level,
                    num_tiles_y: 1 << level,
                    zoom_identifier: level,
                    bounds,
                }
            })
            .collect()
    }

    fn zoom_info(&self) -> ZoomInfo {
        self.zoom_info
    }

    fn tile_key(&self, tile: &TileCoordinate) -> String {
        self.template.format(tile)
    }

    fn bounds(&self) -> Option<RectCoord> {
        Some(Self::world_bounds())
    }
}

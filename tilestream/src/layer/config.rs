//! Layer configuration collaborator.

use crate::error::LayerConfigError;
use crate::tile::{RectCoord, TileCoordinate, ZoomInfo, ZoomLevelInfo};

/// Read-only description of a tiled layer.
///
/// Supplies the zoom table used by grid computation and formats tile
/// coordinates into the key handed to the loader.
pub trait LayerConfig: Send + Sync {
    /// Human-readable layer name (used in logs).
    fn layer_name(&self) -> &str;

    /// Coordinate system the zoom table is expressed in.
    fn coordinate_system(&self) -> i32;

    /// The zoom table, in any order.
    fn zoom_levels(&self) -> Vec<ZoomLevelInfo>;

    /// Layer-wide zoom behaviour.
    fn zoom_info(&self) -> ZoomInfo {
        ZoomInfo::default()
    }

    /// Loader key (typically a URL) for a tile.
    fn tile_key(&self, tile: &TileCoordinate) -> String;

    /// Extent of the layer's data, if bounded.
    fn bounds(&self) -> Option<RectCoord> {
        None
    }
}

/// A layer with an explicit zoom table.
///
/// Keys are produced by the same `{z}/{x}/{y}` template substitution as
/// [`super::WebMercatorLayerConfig`].
#[derive(Debug, Clone)]
pub struct StaticLayerConfig {
    name: String,
    coordinate_system: i32,
    levels: Vec<ZoomLevelInfo>,
    zoom_info: ZoomInfo,
    template: UrlTemplate,
}

impl StaticLayerConfig {
    /// Creates a layer from a zoom table and key template.
    ///
    /// # Errors
    ///
    /// Returns an error if `levels` is empty or the template is missing a
    /// placeholder.
    pub fn new(
        name: impl Into<String>,
        coordinate_system: i32,
        levels: Vec<ZoomLevelInfo>,
        template: impl Into<String>,
    ) -> Result<Self, LayerConfigError> {
        let name = name.into();
        if levels.is_empty() {
            return Err(LayerConfigError::EmptyZoomTable(name));
        }
        Ok(Self {
            name,
            coordinate_system,
            levels,
            zoom_info: ZoomInfo::default(),
            template: UrlTemplate::parse(template.into())?,
        })
    }

    pub fn with_zoom_info(mut self, zoom_info: ZoomInfo) -> Self {
        self.zoom_info = zoom_info;
        self
    }
}

impl LayerConfig for StaticLayerConfig {
    fn layer_name(&self) -> &str {
        &self.name
    }

    fn coordinate_system(&self) -> i32 {
        self.coordinate_system
    }

    fn zoom_levels(&self) -> Vec<ZoomLevelInfo> {
        self.levels.clone()
    }

    fn zoom_info(&self) -> ZoomInfo {
        self.zoom_info
    }

    fn tile_key(&self, tile: &TileCoordinate) -> String {
        self.template.format(tile)
    }
}

// =============================================================================
// URL Template
// =============================================================================

/// A `{z}/{x}/{y}` key template, validated once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    const PLACEHOLDERS: [&'static str; 3] = ["{z}", "{x}", "{y}"];

    /// Validates that every placeholder is present.
    pub fn parse(template: String) -> Result<Self, LayerConfigError> {
        for placeholder in Self::PLACEHOLDERS {
            if !template.contains(placeholder) {
                return Err(LayerConfigError::MissingPlaceholder {
                    template,
                    placeholder,
                });
            }
        }
        Ok(Self(template))
    }

    /// Substitutes the tile's zoom identifier, column and row.
    pub fn format(&self, tile: &TileCoordinate) -> String {
        self.0
            .replace("{z}", &tile.zoom_identifier.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//! Layer-side collaborators: zoom tables, tile keys and coordinate conversion.

mod config;
mod conversion;
mod web_mercator;

pub use config::{LayerConfig, StaticLayerConfig, UrlTemplate};
pub use conversion::{
    lon_lat_to_mercator, mercator_to_lon_lat, CoordinateConverter, DefaultCoordinateConverter,
    MAX_MERCATOR_LATITUDE,
};
pub use web_mercator::{
    WebMercatorLayerConfig, BASE_TILE_WIDTH, BASE_ZOOM, DEFAULT_MAX_ZOOM_LEVEL, MAX_ZOOM_LEVEL,
    WEB_MERCATOR_EXTENT,
};

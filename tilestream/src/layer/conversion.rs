//! Coordinate conversion collaborator.
//!
//! Visible bounds arrive in the renderer's coordinate system and must be
//! expressed in the layer's system before grid computation.

use std::f64::consts::PI;

use super::web_mercator::WEB_MERCATOR_EXTENT;
use crate::error::ConversionError;
use crate::tile::{systems, Coord, RectCoord};

/// Latitude limit of the Web Mercator projection, in degrees.
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_78;

/// Converts points and rectangles between coordinate systems.
pub trait CoordinateConverter: Send + Sync {
    /// Converts a point into `target_system`.
    fn convert(&self, target_system: i32, coord: Coord) -> Result<Coord, ConversionError>;

    /// Converts both corners of a rectangle into `target_system`.
    fn convert_rect(&self, target_system: i32, rect: &RectCoord) -> Result<RectCoord, ConversionError> {
        Ok(RectCoord::new(
            self.convert(target_system, rect.top_left)?,
            self.convert(target_system, rect.bottom_right)?,
        ))
    }
}

/// Identity plus EPSG:4326 <-> EPSG:3857.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCoordinateConverter;

impl CoordinateConverter for DefaultCoordinateConverter {
    fn convert(&self, target_system: i32, coord: Coord) -> Result<Coord, ConversionError> {
        match (coord.system_id, target_system) {
            (from, to) if from == to => Ok(coord),
            (systems::EPSG_4326, systems::EPSG_3857) => {
                let (x, y) = lon_lat_to_mercator(coord.x, coord.y);
                Ok(Coord::new(systems::EPSG_3857, x, y))
            }
            (systems::EPSG_3857, systems::EPSG_4326) => {
                let (lon, lat) = mercator_to_lon_lat(coord.x, coord.y);
                Ok(Coord::new(systems::EPSG_4326, lon, lat))
            }
            (from, to) => Err(ConversionError::Unsupported { from, to }),
        }
    }
}

/// Projects longitude/latitude in degrees to Web Mercator metres.
///
/// Latitudes beyond [`MAX_MERCATOR_LATITUDE`] are clamped.
pub fn lon_lat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
    let x = lon * WEB_MERCATOR_EXTENT / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() * WEB_MERCATOR_EXTENT / PI;
    (x, y)
}

/// Inverse of [`lon_lat_to_mercator`].
pub fn mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = x * 180.0 / WEB_MERCATOR_EXTENT;
    let lat = (2.0 * (y * PI / WEB_MERCATOR_EXTENT).exp().atan() - PI / 2.0) * 180.0 / PI;
    (lon, lat)
}

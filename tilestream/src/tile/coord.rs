//! Projected coordinates and rectangles.

use std::fmt;

/// Well-known coordinate system identifiers (EPSG codes).
pub mod systems {
    /// WGS 84 longitude/latitude in degrees.
    pub const EPSG_4326: i32 = 4326;

    /// Web Mercator in metres.
    pub const EPSG_3857: i32 = 3857;
}

/// A point in a specific coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    /// Coordinate system identifier (see [`systems`]).
    pub system_id: i32,
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(system_id: i32, x: f64, y: f64) -> Self {
        Self { system_id, x, y }
    }
}

/// An axis-aligned rectangle given by two opposite corners.
///
/// The corners keep the orientation of their coordinate system: in Web
/// Mercator the top-left corner has the smaller x and the *larger* y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectCoord {
    pub top_left: Coord,
    pub bottom_right: Coord,
}

impl RectCoord {
    pub fn new(top_left: Coord, bottom_right: Coord) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// Builds a rectangle from raw corner values in one system.
    pub fn from_corners(system_id: i32, left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self::new(
            Coord::new(system_id, left, top),
            Coord::new(system_id, right, bottom),
        )
    }

    /// Coordinate system of the top-left corner.
    pub fn system_id(&self) -> i32 {
        self.top_left.system_id
    }

    /// Absolute width.
    pub fn width(&self) -> f64 {
        (self.bottom_right.x - self.top_left.x).abs()
    }

    /// Absolute height.
    pub fn height(&self) -> f64 {
        (self.bottom_right.y - self.top_left.y).abs()
    }

    /// Center point.
    pub fn center(&self) -> Coord {
        Coord::new(
            self.system_id(),
            self.top_left.x + 0.5 * (self.bottom_right.x - self.top_left.x),
            self.top_left.y + 0.5 * (self.bottom_right.y - self.top_left.y),
        )
    }

    /// Smallest and largest x.
    pub fn x_range(&self) -> (f64, f64) {
        let (a, b) = (self.top_left.x, self.bottom_right.x);
        (a.min(b), a.max(b))
    }

    /// Smallest and largest y.
    pub fn y_range(&self) -> (f64, f64) {
        let (a, b) = (self.top_left.y, self.bottom_right.y);
        (a.min(b), a.max(b))
    }

    /// True for zero-area or non-finite rectangles.
    pub fn is_empty(&self) -> bool {
        let w = self.width();
        let h = self.height();
        !(w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0
    }
}

impl fmt::Display for RectCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[({:.2}, {:.2}) - ({:.2}, {:.2}) @{}]",
            self.top_left.x,
            self.top_left.y,
            self.bottom_right.x,
            self.bottom_right.y,
            self.system_id()
        )
    }
}

//! Coordinate types for the slippy-map tile grid.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// Lowest zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Highest zoom level any supported imagery source publishes.
pub const MAX_ZOOM: u8 = 22;

/// Errors from coordinate conversion and range construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("Invalid latitude: {0} (must be within the Web Mercator range)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Invalid zoom level: {0} (must be between 0 and 22)")]
    InvalidZoom(u8),

    /// Malformed bounding box or tile range.
    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

/// A single raster tile in the slippy-map grid.
///
/// `x` grows eastward from the antimeridian, `y` grows southward from the
/// northern edge of the Mercator square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Bing-style quadkey for this tile.
    ///
    /// Zoom 0 has an empty quadkey.
    pub fn quadkey(&self) -> String {
        let mut key = String::with_capacity(self.zoom as usize);
        for level in (1..=self.zoom).rev() {
            let mask = 1u32 << (level - 1);
            let mut digit = b'0';
            if self.x & mask != 0 {
                digit += 1;
            }
            if self.y & mask != 0 {
                digit += 2;
            }
            key.push(digit as char);
        }
        key
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Fractional position on the tile grid.
///
/// The integer part names the tile, the fractional part the offset inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileXY {
    pub x: f64,
    pub y: f64,
}

/// Inclusive rectangle of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRange {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
    pub zoom: u8,
}

impl TileRange {
    /// Creates a range, rejecting inverted bounds and unsupported zooms.
    pub fn new(min_x: u32, max_x: u32, min_y: u32, max_y: u32, zoom: u8) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        if min_x > max_x || min_y > max_y {
            return Err(CoordError::InvalidRange(format!(
                "x {}..={} y {}..={} is inverted",
                min_x, max_x, min_y, max_y
            )));
        }
        Ok(Self {
            min_x,
            max_x,
            min_y,
            max_y,
            zoom,
        })
    }

    /// Number of tile columns.
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    /// Number of tile rows.
    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Total number of tiles in the range.
    pub fn size(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        coord.zoom == self.zoom
            && (self.min_x..=self.max_x).contains(&coord.x)
            && (self.min_y..=self.max_y).contains(&coord.y)
    }

    /// Intersects the range with `[min, max]` on both axes.
    ///
    /// Returns `None` when nothing is left.
    pub fn clamp(&self, min: u32, max: u32) -> Option<TileRange> {
        let min_x = self.min_x.max(min);
        let max_x = self.max_x.min(max);
        let min_y = self.min_y.max(min);
        let max_y = self.max_y.min(max);
        TileRange::new(min_x, max_x, min_y, max_y, self.zoom).ok()
    }

    /// Iterates the tiles row by row, west to east within a row.
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> {
        let range = *self;
        (range.min_y..=range.max_y).flat_map(move |y| {
            (range.min_x..=range.max_x).map(move |x| TileCoord::new(x, y, range.zoom))
        })
    }
}

impl fmt::Display for TileRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "z{} x {}..={} y {}..={}",
            self.zoom, self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

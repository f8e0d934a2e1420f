//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and fractional Web Mercator tile coordinates, plus the bounding-box
//! geometry used to size sample regions.

mod geobox;
mod types;

pub use geobox::{haversine_meters, GeoBox, EARTH_RADIUS_METERS};
pub use types::{
    CoordError, TileCoord, TileRange, TileXY, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON,
    MIN_ZOOM,
};

use std::f64::consts::PI;

/// Number of tiles along one axis at `zoom`.
#[inline]
pub fn tiles_per_axis(zoom: u8) -> u64 {
    1u64 << zoom.min(MAX_ZOOM)
}

/// Converts geographic coordinates to fractional tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 22)
///
/// # Returns
///
/// A `Result` containing the fractional position or an error if inputs are invalid.
#[inline]
pub fn to_tile_xy(lat: f64, lon: f64, zoom: u8) -> Result<TileXY, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = tiles_per_axis(zoom) as f64;

    let x = (lon + 180.0) / 360.0 * n;

    let lat_rad = lat * PI / 180.0;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n;

    Ok(TileXY { x, y })
}

/// Converts fractional tile coordinates back to `(lat, lon)`.
///
/// Integer inputs give the tile's northwest corner.
#[inline]
pub fn to_lat_lon(x: f64, y: f64, zoom: u8) -> Result<(f64, f64), CoordError> {
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = tiles_per_axis(zoom) as f64;

    let lon = x / n * 360.0 - 180.0;

    let lat_rad = (PI * (1.0 - 2.0 * y / n)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    Ok((lat, lon))
}

/// Computes the tiles covering `bbox` at `zoom`, limited to the world grid.
///
/// The box is clipped to the Mercator square first, so boxes that reach
/// past the poles still produce a usable range.
pub fn tile_range(bbox: &GeoBox, zoom: u8) -> Result<TileRange, CoordError> {
    bbox.validate()?;
    let clipped = bbox.clamp_to_mercator();

    let top_left = to_tile_xy(clipped.max_lat, clipped.min_lon, zoom)?;
    let bottom_right = to_tile_xy(clipped.min_lat, clipped.max_lon, zoom)?;

    let last = (tiles_per_axis(zoom) - 1) as u32;
    let to_index = |v: f64| (v.floor().max(0.0) as u32).min(last);

    TileRange::new(
        to_index(top_left.x),
        to_index(bottom_right.x),
        to_index(top_left.y),
        to_index(bottom_right.y),
        zoom,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let result = to_tile_xy(40.7128, -74.0060, 16);
        assert!(result.is_ok(), "Valid coordinates should not error");

        let xy = result.unwrap();
        assert_eq!(xy.x.floor() as u32, 19295);
        assert_eq!(xy.y.floor() as u32, 24640);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_tile_xy(90.0, 0.0, 10);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_longitude() {
        let result = to_tile_xy(0.0, 181.0, 10);
        assert!(matches!(result, Err(CoordError::InvalidLongitude(_))));
    }

    #[test]
    fn test_invalid_zoom() {
        assert!(matches!(
            to_tile_xy(0.0, 0.0, MAX_ZOOM + 1),
            Err(CoordError::InvalidZoom(23))
        ));
        assert!(matches!(
            to_lat_lon(0.0, 0.0, 30),
            Err(CoordError::InvalidZoom(30))
        ));
    }

    #[test]
    fn test_zoom_zero_covers_world() {
        let xy = to_tile_xy(0.0, 0.0, 0).unwrap();
        assert!((xy.x - 0.5).abs() < 1e-12);
        assert!((xy.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_to_lat_lon_northwest_corner() {
        let (lat, lon) = to_lat_lon(19295.0, 24640.0, 16).unwrap();

        // Should be close to NYC but not exact (northwest corner of tile)
        assert!((lat - 40.713).abs() < 0.01, "Latitude should be close to 40.713");
        assert!((lon - (-74.007)).abs() < 0.01, "Longitude should be close to -74.007");
    }

    #[test]
    fn test_to_lat_lon_at_equator() {
        let (lat, lon) = to_lat_lon(512.0, 512.0, 10).unwrap();
        assert!(lat.abs() < 1e-9, "Should be on the equator");
        assert!(lon.abs() < 1e-9, "Should be on the prime meridian");
    }

    #[test]
    fn test_roundtrip_conversion() {
        let original_lat = 40.7128;
        let original_lon = -74.0060;

        let xy = to_tile_xy(original_lat, original_lon, 16).unwrap();
        let (lat, lon) = to_lat_lon(xy.x, xy.y, 16).unwrap();

        assert!((lat - original_lat).abs() < 1e-9);
        assert!((lon - original_lon).abs() < 1e-9);
    }

    #[test]
    fn test_tile_range_small_box() {
        let bbox = GeoBox::new(40.7120, -74.0070, 40.7130, -74.0050).unwrap();
        let range = tile_range(&bbox, 16).unwrap();

        assert_eq!(range.zoom, 16);
        assert!(range.min_x <= 19295 && 19295 <= range.max_x);
        assert!(range.min_y <= 24640 && 24640 <= range.max_y);
        assert!(range.size() >= 1);
    }

    #[test]
    fn test_tile_range_clamped_at_antimeridian() {
        let bbox = GeoBox::new(-1.0, 179.0, 1.0, 180.0).unwrap();
        let range = tile_range(&bbox, 4).unwrap();
        assert_eq!(range.max_x, 15);
    }

    #[test]
    fn test_tile_range_clamped_at_poles() {
        let bbox = GeoBox::new(80.0, 0.0, 90.0, 1.0).unwrap();
        let range = tile_range(&bbox, 3).unwrap();
        assert_eq!(range.min_y, 0);
    }

    #[test]
    fn test_tile_range_zoom_zero_is_single_tile() {
        let bbox = GeoBox::new(-10.0, -10.0, 10.0, 10.0).unwrap();
        let range = tile_range(&bbox, 0).unwrap();
        assert_eq!(range.size(), 1);
    }

    #[test]
    fn test_tile_range_size() {
        let range = TileRange::new(100, 101, 200, 200, 18).unwrap();
        assert_eq!(range.width(), 2);
        assert_eq!(range.height(), 1);
        assert_eq!(range.size(), 2);
        assert_eq!(range.coords().count(), 2);
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(matches!(
            TileRange::new(5, 4, 0, 0, 10),
            Err(CoordError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_range_clamp() {
        let range = TileRange::new(0, 20, 3, 9, 4).unwrap();
        let clamped = range.clamp(0, 15).unwrap();
        assert_eq!(clamped.max_x, 15);
        assert_eq!(clamped.max_y, 9);

        assert!(TileRange::new(16, 20, 16, 20, 4).unwrap().clamp(0, 15).is_none());
    }

    #[test]
    fn test_coords_row_major() {
        let range = TileRange::new(3, 4, 7, 8, 5).unwrap();
        let coords: Vec<_> = range.coords().collect();
        assert_eq!(
            coords,
            vec![
                TileCoord::new(3, 7, 5),
                TileCoord::new(4, 7, 5),
                TileCoord::new(3, 8, 5),
                TileCoord::new(4, 8, 5),
            ]
        );
    }

    #[test]
    fn test_quadkey() {
        assert_eq!(TileCoord::new(3, 5, 3).quadkey(), "213");
        assert_eq!(TileCoord::new(0, 0, 0).quadkey(), "");
        assert_eq!(TileCoord::new(1, 1, 1).quadkey(), "3");
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_roundtrip_property(
                lat in -85.05..85.05_f64,
                lon in -180.0..180.0_f64,
                zoom in 0u8..=MAX_ZOOM
            ) {
                let xy = to_tile_xy(lat, lon, zoom)?;
                let (converted_lat, converted_lon) = to_lat_lon(xy.x, xy.y, zoom)?;

                prop_assert!(
                    (converted_lat - lat).abs() < 1e-7,
                    "Latitude roundtrip failed: {} -> {}", lat, converted_lat
                );
                prop_assert!(
                    (converted_lon - lon).abs() < 1e-7,
                    "Longitude roundtrip failed: {} -> {}", lon, converted_lon
                );
            }

            #[test]
            fn test_tile_xy_in_bounds(
                lat in -85.05..85.05_f64,
                lon in -180.0..180.0_f64,
                zoom in 0u8..=MAX_ZOOM
            ) {
                let xy = to_tile_xy(lat, lon, zoom)?;
                let n = tiles_per_axis(zoom) as f64;
                prop_assert!(xy.x >= 0.0 && xy.x <= n);
                prop_assert!(xy.y >= 0.0 && xy.y <= n);
            }

            #[test]
            fn test_range_size_law(
                min_x in 0u32..1000,
                w in 0u32..50,
                min_y in 0u32..1000,
                h in 0u32..50
            ) {
                let range = TileRange::new(min_x, min_x + w, min_y, min_y + h, 12)?;
                prop_assert_eq!(range.size(), (w as u64 + 1) * (h as u64 + 1));
                prop_assert!(range.size() >= 1);
                prop_assert_eq!(range.coords().count() as u64, range.size());
            }
        }
    }
}

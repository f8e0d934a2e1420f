//! Geographic bounding boxes and their physical sizing.

use serde::{Deserialize, Serialize};

use super::types::{CoordError, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Earth radius used for all distance calculations (3958.75 miles).
pub const EARTH_RADIUS_METERS: f64 = 3958.75 * 1609.0;

/// Upper bound on refinement passes in [`GeoBox::ensure_min_size`].
const MAX_SIZING_PASSES: usize = 8;

/// Great-circle distance between two points in meters.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Axis-aligned geographic rectangle in degrees.
///
/// Values are immutable: every growth operation returns a new box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl GeoBox {
    /// Creates a validated box.
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Result<Self, CoordError> {
        let bbox = Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Checks that all edges are finite, ordered and on the globe.
    pub fn validate(&self) -> Result<(), CoordError> {
        let edges = [self.min_lat, self.min_lon, self.max_lat, self.max_lon];
        if edges.iter().any(|v| !v.is_finite()) {
            return Err(CoordError::InvalidRange(format!(
                "non-finite bounding box {:?}",
                self
            )));
        }
        if self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(CoordError::InvalidRange(format!(
                "inverted bounding box {:?}",
                self
            )));
        }
        for lat in [self.min_lat, self.max_lat] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(CoordError::InvalidLatitude(lat));
            }
        }
        for lon in [self.min_lon, self.max_lon] {
            if !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(CoordError::InvalidLongitude(lon));
            }
        }
        Ok(())
    }

    /// Center as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// East-west extent in meters, measured along the center parallel.
    pub fn width_meters(&self) -> f64 {
        let (lat, _) = self.center();
        haversine_meters(lat, self.min_lon, lat, self.max_lon)
    }

    /// North-south extent in meters, measured along the center meridian.
    pub fn height_meters(&self) -> f64 {
        let (_, lon) = self.center();
        haversine_meters(self.min_lat, lon, self.max_lat, lon)
    }

    /// True when the box has no area.
    pub fn is_empty(&self) -> bool {
        self.max_lat <= self.min_lat || self.max_lon <= self.min_lon
    }

    /// Expands each axis around the center by `factor` of its own span.
    ///
    /// A factor of 0.4 turns a 100 m wide box into a 140 m wide one.
    pub fn grow(&self, factor: f64) -> GeoBox {
        self.grow_axes(factor, factor)
    }

    fn grow_axes(&self, lat_factor: f64, lon_factor: f64) -> GeoBox {
        let dy = 0.5 * (self.max_lat - self.min_lat) * lat_factor;
        let dx = 0.5 * (self.max_lon - self.min_lon) * lon_factor;
        GeoBox {
            min_lat: self.min_lat - dy,
            min_lon: self.min_lon - dx,
            max_lat: self.max_lat + dy,
            max_lon: self.max_lon + dx,
        }
    }

    fn with_lat_span(&self, span: f64) -> GeoBox {
        let (lat, _) = self.center();
        GeoBox {
            min_lat: lat - span / 2.0,
            max_lat: lat + span / 2.0,
            ..*self
        }
    }

    fn with_lon_span(&self, span: f64) -> GeoBox {
        let (_, lon) = self.center();
        GeoBox {
            min_lon: lon - span / 2.0,
            max_lon: lon + span / 2.0,
            ..*self
        }
    }

    /// Grows each axis independently until it spans at least `min_meters`.
    ///
    /// The center is preserved. Axes that are already large enough are left
    /// untouched. Degenerate axes (zero span) are seeded from the Earth radius.
    pub fn ensure_min_size(&self, min_meters: f64) -> GeoBox {
        if min_meters <= 0.0 {
            return *self;
        }

        let mut bbox = *self;

        if bbox.height_meters() < min_meters && bbox.max_lat <= bbox.min_lat {
            bbox = bbox.with_lat_span((min_meters / EARTH_RADIUS_METERS).to_degrees());
        }
        for _ in 0..MAX_SIZING_PASSES {
            let height = bbox.height_meters();
            if height >= min_meters {
                break;
            }
            bbox = bbox.grow_axes(min_meters / height * (1.0 + 1e-9) - 1.0, 0.0);
        }

        if bbox.width_meters() < min_meters && bbox.max_lon <= bbox.min_lon {
            let (lat, _) = bbox.center();
            let cos = lat.to_radians().cos().max(1e-6);
            bbox = bbox.with_lon_span((min_meters / (EARTH_RADIUS_METERS * cos)).to_degrees());
        }
        for _ in 0..MAX_SIZING_PASSES {
            let width = bbox.width_meters();
            if width >= min_meters {
                break;
            }
            bbox = bbox.grow_axes(0.0, min_meters / width * (1.0 + 1e-9) - 1.0);
        }

        bbox
    }

    /// Minimum-size growth followed by proportional growth.
    pub fn grow_to_sample(&self, min_meters: f64, factor: f64) -> GeoBox {
        self.ensure_min_size(min_meters).grow(factor)
    }

    /// Clips the box to valid latitudes and longitudes.
    ///
    /// Growth near the antimeridian or a pole can push edges off the globe.
    pub fn clamp_to_world(&self) -> GeoBox {
        GeoBox {
            min_lat: self.min_lat.clamp(-90.0, 90.0),
            min_lon: self.min_lon.clamp(MIN_LON, MAX_LON),
            max_lat: self.max_lat.clamp(-90.0, 90.0),
            max_lon: self.max_lon.clamp(MIN_LON, MAX_LON),
        }
    }

    /// Clips the box to the Web Mercator square.
    pub fn clamp_to_mercator(&self) -> GeoBox {
        GeoBox {
            min_lat: self.min_lat.clamp(MIN_LAT, MAX_LAT),
            min_lon: self.min_lon.clamp(MIN_LON, MAX_LON),
            max_lat: self.max_lat.clamp(MIN_LAT, MAX_LAT),
            max_lon: self.max_lon.clamp(MIN_LON, MAX_LON),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_box() -> GeoBox {
        GeoBox::new(10.0, 20.0, 10.001, 20.001).unwrap()
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_meters(0.0, 0.0, 1.0, 0.0);
        let expected = EARTH_RADIUS_METERS * 1.0_f64.to_radians();
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_zero_distance() {
        assert_eq!(haversine_meters(45.0, 7.0, 45.0, 7.0), 0.0);
    }

    #[test]
    fn test_validate_rejects_inverted_box() {
        let bbox = GeoBox {
            min_lat: 11.0,
            min_lon: 20.0,
            max_lat: 10.0,
            max_lon: 21.0,
        };
        assert!(matches!(bbox.validate(), Err(CoordError::InvalidRange(_))));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let bbox = GeoBox {
            min_lat: f64::NAN,
            min_lon: 20.0,
            max_lat: 10.0,
            max_lon: 21.0,
        };
        assert!(matches!(bbox.validate(), Err(CoordError::InvalidRange(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_globe_longitude() {
        assert!(matches!(
            GeoBox::new(0.0, 170.0, 1.0, 190.0),
            Err(CoordError::InvalidLongitude(_))
        ));
    }

    #[test]
    fn test_ensure_min_size_reaches_200_meters() {
        let bbox = small_box();
        let grown = bbox.grow_to_sample(200.0, 0.0);

        assert!(grown.width_meters() >= 200.0, "width {}", grown.width_meters());
        assert!(grown.height_meters() >= 200.0, "height {}", grown.height_meters());

        let (lat, lon) = bbox.center();
        let (g_lat, g_lon) = grown.center();
        assert!((lat - g_lat).abs() < 1e-9);
        assert!((lon - g_lon).abs() < 1e-9);
    }

    #[test]
    fn test_ensure_min_size_leaves_large_axis_alone() {
        // ~1.1 km tall, ~11 m wide
        let bbox = GeoBox::new(10.0, 20.0, 10.01, 20.0001).unwrap();
        let grown = bbox.ensure_min_size(200.0);

        assert_eq!(grown.min_lat, bbox.min_lat);
        assert_eq!(grown.max_lat, bbox.max_lat);
        assert!(grown.width_meters() >= 200.0);
    }

    #[test]
    fn test_ensure_min_size_handles_point() {
        let point = GeoBox::new(51.5, -0.12, 51.5, -0.12).unwrap();
        let grown = point.ensure_min_size(50.0);

        assert!(grown.width_meters() >= 50.0);
        assert!(grown.height_meters() >= 50.0);
        assert!(!grown.is_empty());
    }

    #[test]
    fn test_grow_by_factor() {
        let bbox = small_box();
        let grown = bbox.grow(0.4);

        let ratio_w = grown.width_meters() / bbox.width_meters();
        let ratio_h = grown.height_meters() / bbox.height_meters();
        assert!((ratio_w - 1.4).abs() < 1e-4, "ratio_w = {}", ratio_w);
        assert!((ratio_h - 1.4).abs() < 1e-4, "ratio_h = {}", ratio_h);
    }

    #[test]
    fn test_grow_zero_is_identity() {
        let bbox = small_box();
        assert_eq!(bbox.grow(0.0), bbox);
    }

    #[test]
    fn test_grown_box_clamped_to_world() {
        let bbox = GeoBox::new(-16.69, 179.9990, -16.689, 179.9999).unwrap();
        let grown = bbox.grow_to_sample(200.0, 0.4);
        assert!(grown.max_lon > MAX_LON);

        let clamped = grown.clamp_to_world();
        assert!(clamped.validate().is_ok());
        assert_eq!(clamped.max_lon, MAX_LON);
        assert_eq!(clamped.min_lon, grown.min_lon);
    }

    #[test]
    fn test_clamp_to_mercator() {
        let bbox = GeoBox::new(84.0, 10.0, 89.0, 11.0).unwrap();
        let clamped = bbox.clamp_to_mercator();
        assert_eq!(clamped.max_lat, MAX_LAT);
        assert_eq!(clamped.min_lat, 84.0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_grow_scales_physical_size(
                lat in -70.0..70.0_f64,
                lon in -170.0..170.0_f64,
                d_lat in 0.0005..0.5_f64,
                d_lon in 0.0005..0.5_f64,
                factor in 0.0..2.0_f64
            ) {
                let bbox = GeoBox::new(lat, lon, lat + d_lat, lon + d_lon).unwrap();
                let grown = bbox.grow(factor);

                let expected_w = bbox.width_meters() * (1.0 + factor);
                let expected_h = bbox.height_meters() * (1.0 + factor);
                prop_assert!((grown.width_meters() - expected_w).abs() / expected_w < 1e-3);
                prop_assert!((grown.height_meters() - expected_h).abs() / expected_h < 1e-3);
            }

            #[test]
            fn test_min_size_is_reached(
                lat in -70.0..70.0_f64,
                lon in -170.0..170.0_f64,
                d_lat in 0.0..0.001_f64,
                d_lon in 0.0..0.001_f64,
                min_meters in 1.0..2000.0_f64
            ) {
                let bbox = GeoBox::new(lat, lon, lat + d_lat, lon + d_lon).unwrap();
                let grown = bbox.ensure_min_size(min_meters);

                prop_assert!(grown.width_meters() >= min_meters);
                prop_assert!(grown.height_meters() >= min_meters);

                let (c_lat, c_lon) = bbox.center();
                let (g_lat, g_lon) = grown.center();
                prop_assert!((c_lat - g_lat).abs() < 1e-7);
                prop_assert!((c_lon - g_lon).abs() < 1e-7);
            }
        }
    }
}

//! Great-circle distance helpers
//!
//! Distances use the haversine formula on a spherical Earth:
//! `d = 2R·asin(√(sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)))`

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two (lat, lon) points in degrees
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    // Rounding can push `a` a hair above 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * a.clamp(0.0, 1.0).sqrt().asin()
}

/// Coordinate rectangle guaranteed to contain every point within a radius
///
/// Used as a coarse SQL prefilter; callers must still apply the exact
/// haversine test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Slack added to every edge so the box is a strict superset
const BOX_MARGIN_DEG: f64 = 1e-6;

impl BoundingBox {
    /// Box around `(lat, lon)` covering `radius_km`
    ///
    /// Falls back to the full longitude range when the circle reaches a pole
    /// or crosses the antimeridian.
    pub fn around(lat: f64, lon: f64, radius_km: f64) -> Self {
        let angular = radius_km / EARTH_RADIUS_KM;
        let lat_delta = angular.to_degrees() + BOX_MARGIN_DEG;

        let min_lat = (lat - lat_delta).max(-90.0);
        let max_lat = (lat + lat_delta).min(90.0);

        let full_lon = Self {
            min_lat,
            max_lat,
            min_lon: -180.0,
            max_lon: 180.0,
        };

        if min_lat <= -90.0 || max_lat >= 90.0 || angular >= std::f64::consts::FRAC_PI_2 {
            return full_lon;
        }

        let ratio = angular.sin() / lat.to_radians().cos();
        if ratio >= 1.0 {
            return full_lon;
        }
        let lon_delta = ratio.asin().to_degrees() + BOX_MARGIN_DEG;

        let min_lon = lon - lon_delta;
        let max_lon = lon + lon_delta;
        if min_lon < -180.0 || max_lon > 180.0 {
            return full_lon;
        }

        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

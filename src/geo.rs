//! Geographic primitives.
//!
//! Coordinates are WGS84 degrees. Straight-line distances use the Haversine
//! formula; the road-distance approximation (Haversine times a fudge factor)
//! lives with the callers so each stage can choose its own treatment.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic point (latitude, longitude) in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }
}

/// Great-circle distance between two points in km.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance_to_self() {
        let p = GeoPoint::new(40.7128, -74.0060);
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = GeoPoint::new(40.0, -74.0);
        let b = GeoPoint::new(41.0, -74.0);
        let d = haversine_km(a, b);
        // one degree of latitude is ~111.2 km
        assert!((d - 111.19).abs() < 0.5, "got {}", d);
    }

    #[test]
    fn test_symmetry() {
        let a = GeoPoint::new(40.7128, -74.0060);
        let b = GeoPoint::new(40.6782, -73.9442);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-12);
    }
}

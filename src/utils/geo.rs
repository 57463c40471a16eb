// src/utils/geo.rs
use serde::{Deserialize, Serialize};

use crate::errors::{HaulwayError, HaulwayResult};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn validate(&self, field: &str) -> HaulwayResult<()> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lng_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(HaulwayError::InvalidFieldValue {
                field: field.to_string(),
                value: format!("{},{}", self.latitude, self.longitude),
                reason: "latitude must be within ±90 and longitude within ±180".to_string(),
            })
        }
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self, other)
    }
}

/// Great-circle distance between two points.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Travel time in whole minutes, rounded up. Any positive distance takes at least a minute.
pub fn eta_minutes(distance_km: f64, speed_kmh: f64) -> u32 {
    if distance_km <= 0.0 || speed_kmh <= 0.0 {
        return 0;
    }
    ((distance_km / speed_kmh) * 60.0).ceil().max(1.0) as u32
}

/// Ray-casting point-in-polygon test. Vertices are treated as a closed ring.
pub fn polygon_contains(vertices: &[GeoPoint], point: &GeoPoint) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = vertices.len() - 1;

    for i in 0..vertices.len() {
        let (xi, yi) = (vertices[i].longitude, vertices[i].latitude);
        let (xj, yj) = (vertices[j].longitude, vertices[j].latitude);

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Accra to Kumasi is roughly 200 km as the crow flies
        let accra = GeoPoint::new(5.6037, -0.1870);
        let kumasi = GeoPoint::new(6.6885, -1.6244);
        let d = haversine_km(&accra, &kumasi);
        assert!((195.0..=205.0).contains(&d), "distance was {}", d);
        assert_eq!(haversine_km(&accra, &accra), 0.0);
    }

    #[test]
    fn test_eta_rounds_up() {
        assert_eq!(eta_minutes(0.0, 30.0), 0);
        assert_eq!(eta_minutes(0.01, 30.0), 1);
        assert_eq!(eta_minutes(15.0, 30.0), 30);
        assert_eq!(eta_minutes(15.1, 30.0), 31);
    }

    #[test]
    fn test_polygon_contains() {
        let square = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(1.0, 0.0),
        ];
        assert!(polygon_contains(&square, &GeoPoint::new(0.5, 0.5)));
        assert!(!polygon_contains(&square, &GeoPoint::new(1.5, 0.5)));
        assert!(!polygon_contains(&square[..2], &GeoPoint::new(0.5, 0.5)));
    }

    #[test]
    fn test_point_validation() {
        assert!(GeoPoint::new(5.6, -0.18).validate("pickup").is_ok());
        assert!(GeoPoint::new(95.0, 0.0).validate("pickup").is_err());
        assert!(GeoPoint::new(0.0, f64::NAN).validate("pickup").is_err());
    }

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(12.346), 12.35);
        assert_eq!(round_money(10.0), 10.0);
    }
}

// src/models/driver.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::GeoPoint;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverKind {
    Ride,
    Taxi,
    DispatchRider,
    Mover,
    EmergencyResponder,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Offline, // Not taking work
    Online,  // Available for bookings
    Busy,    // On a booking
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    Motorcycle,
    Car,
    Van,
    Truck,
    Bicycle,
    Ambulance,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Vehicle {
    pub license_plate: String,
    pub vehicle_type: VehicleType,
    pub make: String,
    pub model: String,
    pub color: String,
    pub capacity_kg: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverLocation {
    pub point: GeoPoint,
    pub heading: Option<f64>,   // Degrees (0-360)
    pub speed_kmh: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverProfile {
    pub id: String,
    pub user_id: String,
    pub kind: DriverKind,
    pub vehicle: Vehicle,
    pub availability: Availability,
    pub location: Option<DriverLocation>,
    pub zone_id: Option<String>,
    pub is_verified: bool,
    pub rating: f32,       // Running average (0-5)
    pub rating_count: u32,
    pub total_trips: u32,
    pub current_booking_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DriverProfile {
    pub fn is_dispatchable(&self) -> bool {
        self.is_verified
            && self.availability == Availability::Online
            && self.current_booking_id.is_none()
            && self.location.is_some()
    }

    pub fn record_rating(&mut self, score: u8) {
        let total = self.rating * self.rating_count as f32 + score as f32;
        self.rating_count += 1;
        self.rating = total / self.rating_count as f32;
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverRegistration {
    pub kind: DriverKind,
    pub vehicle: Vehicle,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityUpdate {
    pub availability: Availability,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed_kmh: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub kind: DriverKind,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NearbyDriver {
    pub driver: DriverProfile,
    pub distance_km: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_rating_average() {
        let now = Utc::now();
        let mut driver = DriverProfile {
            id: "drv-250101-abcde".to_string(),
            user_id: "usr-250101-abcde".to_string(),
            kind: DriverKind::Ride,
            vehicle: Vehicle {
                license_plate: "GR-1234-24".to_string(),
                vehicle_type: VehicleType::Car,
                make: "Toyota".to_string(),
                model: "Corolla".to_string(),
                color: "Silver".to_string(),
                capacity_kg: None,
            },
            availability: Availability::Offline,
            location: None,
            zone_id: None,
            is_verified: true,
            rating: 0.0,
            rating_count: 0,
            total_trips: 0,
            current_booking_id: None,
            created_at: now,
            updated_at: now,
        };

        driver.record_rating(5);
        driver.record_rating(3);
        assert_eq!(driver.rating_count, 2);
        assert!((driver.rating - 4.0).abs() < f32::EPSILON);
        assert!(!driver.is_dispatchable());
    }
}

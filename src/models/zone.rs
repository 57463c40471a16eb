// src/models/zone.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::booking::BookingKind;
use crate::utils::GeoPoint;
use crate::utils::geo::{haversine_km, polygon_contains};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneBoundary {
    Circle { center: GeoPoint, radius_km: f64 },
    Polygon { vertices: Vec<GeoPoint> },
}

impl ZoneBoundary {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        match self {
            ZoneBoundary::Circle { center, radius_km } => haversine_km(center, point) <= *radius_km,
            ZoneBoundary::Polygon { vertices } => polygon_contains(vertices, point),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceZone {
    pub id: String,
    pub name: String,
    pub boundary: ZoneBoundary,
    pub surge_multiplier: f64,
    pub supported_kinds: Vec<BookingKind>, // Empty means every kind
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceZone {
    pub fn supports(&self, kind: BookingKind) -> bool {
        self.supported_kinds.is_empty() || self.supported_kinds.contains(&kind)
    }

    pub fn covers(&self, point: &GeoPoint, kind: BookingKind) -> bool {
        self.active && self.supports(kind) && self.boundary.contains(point)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ZoneCreate {
    pub name: String,
    pub boundary: ZoneBoundary,
    pub surge_multiplier: Option<f64>,
    #[serde(default)]
    pub supported_kinds: Vec<BookingKind>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ZoneUpdate {
    pub name: Option<String>,
    pub boundary: Option<ZoneBoundary>,
    pub surge_multiplier: Option<f64>,
    pub supported_kinds: Option<Vec<BookingKind>>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub kind: BookingKind,
}

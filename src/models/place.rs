// src/models/place.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::GeoPoint;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub available: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Place {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub category: String, // e.g. "restaurant", "pharmacy", "grocery"
    pub description: Option<String>,
    pub location: GeoPoint,
    pub address: String,
    pub zone_id: Option<String>,
    pub is_open: bool,
    pub items: Vec<CatalogItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Place {
    pub fn item(&self, item_id: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == item_id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceCreate {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub location: GeoPoint,
    pub address: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PlaceUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub location: Option<GeoPoint>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenUpdate {
    pub is_open: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemCreate {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub available: Option<bool>,
}

// Search Models
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchHit {
    pub place_id: String,
    pub name: String,
    pub category: String,
    pub address: String,
    pub is_open: bool,
    pub distance_km: Option<f64>,
    pub matching_items: Vec<CatalogItem>,
}

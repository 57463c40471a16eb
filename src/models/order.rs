// src/models/order.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::booking::Stop;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Accepted,
    Preparing,
    ReadyForPickup, // Waiting for a delivery booking
    OutForDelivery,
    Delivered,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Placed, Accepted)
                | (Placed, Rejected)
                | (Placed, Cancelled)
                | (Accepted, Preparing)
                | (Accepted, Cancelled)
                | (Preparing, ReadyForPickup)
                | (ReadyForPickup, OutForDelivery)
                | (OutForDelivery, Delivered)
                | (OutForDelivery, ReadyForPickup) // Courier booking was cancelled
        )
    }

    pub fn event_suffix(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Preparing => "preparing",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrderLine {
    pub item_id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

impl OrderLine {
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub place_id: String,
    pub lines: Vec<OrderLine>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total: f64,
    pub currency: String,
    pub status: OrderStatus,
    pub dropoff: Stop,
    pub recipient_name: String,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub delivery_booking_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderRequest {
    pub place_id: String,
    pub lines: Vec<OrderLineRequest>,
    pub dropoff: Stop,
    pub recipient_name: String,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

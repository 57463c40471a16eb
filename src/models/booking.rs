// src/models/booking.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::driver::DriverKind;
use crate::utils::GeoPoint;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingKind {
    Ride,
    Taxi,
    Delivery,
    Moving,
    Emergency,
}

impl BookingKind {
    /// The only driver kind allowed to serve this booking kind.
    pub fn driver_kind(&self) -> DriverKind {
        match self {
            BookingKind::Ride => DriverKind::Ride,
            BookingKind::Taxi => DriverKind::Taxi,
            BookingKind::Delivery => DriverKind::DispatchRider,
            BookingKind::Moving => DriverKind::Mover,
            BookingKind::Emergency => DriverKind::EmergencyResponder,
        }
    }

    pub fn average_speed_kmh(&self) -> f64 {
        match self {
            BookingKind::Ride | BookingKind::Taxi => 30.0,
            BookingKind::Delivery => 25.0,
            BookingKind::Moving => 20.0,
            BookingKind::Emergency => 45.0,
        }
    }

    pub fn requires_dropoff(&self) -> bool {
        !matches!(self, BookingKind::Emergency)
    }
}

impl DriverKind {
    pub fn serves(&self) -> BookingKind {
        match self {
            DriverKind::Ride => BookingKind::Ride,
            DriverKind::Taxi => BookingKind::Taxi,
            DriverKind::DispatchRider => BookingKind::Delivery,
            DriverKind::Mover => BookingKind::Moving,
            DriverKind::EmergencyResponder => BookingKind::Emergency,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,        // Waiting for a driver
    DriverAssigned, // Driver accepted and is heading to pickup
    DriverArrived,  // Driver is at pickup
    InProgress,     // Passenger, package or load on board
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, DriverAssigned)
                | (Pending, Cancelled)
                | (DriverAssigned, DriverArrived)
                | (DriverAssigned, Pending)
                | (DriverAssigned, Cancelled)
                | (DriverArrived, InProgress)
                | (DriverArrived, Cancelled)
                | (InProgress, Completed)
        )
    }

    pub fn event_suffix(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::DriverAssigned => "driver_assigned",
            BookingStatus::DriverArrived => "driver_arrived",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageSize {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl PackageSize {
    pub fn surcharge(&self) -> f64 {
        match self {
            PackageSize::Small => 0.0,
            PackageSize::Medium => 8.0,
            PackageSize::Large => 20.0,
            PackageSize::ExtraLarge => 40.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyCategory {
    Medical,
    Fire,
    Security,
    Roadside,
}

/// Kind-specific booking payload. The tag decides the booking kind.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingDetails {
    Ride {
        passengers: u8,
    },
    Taxi {
        passengers: u8,
    },
    Delivery {
        package_size: PackageSize,
        description: String,
        recipient_name: String,
        recipient_phone: String,
    },
    Moving {
        rooms: u8,
        helpers: u8,
        scheduled_for: Option<DateTime<Utc>>,
    },
    Emergency {
        category: EmergencyCategory,
        notes: Option<String>,
    },
}

impl BookingDetails {
    pub fn kind(&self) -> BookingKind {
        match self {
            BookingDetails::Ride { .. } => BookingKind::Ride,
            BookingDetails::Taxi { .. } => BookingKind::Taxi,
            BookingDetails::Delivery { .. } => BookingKind::Delivery,
            BookingDetails::Moving { .. } => BookingKind::Moving,
            BookingDetails::Emergency { .. } => BookingKind::Emergency,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Stop {
    pub location: GeoPoint,
    pub address: String,
    pub contact_phone: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Fare {
    pub base_fare: f64,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub surcharge: f64,
    pub surge_multiplier: f64,
    pub discount: f64,
    pub service_fee: f64,
    pub total: f64,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Captured,
    Voided,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusChange {
    pub from: Option<BookingStatus>,
    pub to: BookingStatus,
    pub actor: String, // "system", "customer:{id}", "driver:{id}", "admin:{id}"
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingRating {
    pub score: u8,
    pub comment: Option<String>,
    pub rated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Booking {
    pub id: String,
    pub kind: BookingKind,
    pub customer_id: String,
    pub driver_id: Option<String>,
    pub status: BookingStatus,

    pub pickup: Stop,
    pub dropoff: Option<Stop>,
    pub details: BookingDetails,
    pub zone_id: Option<String>,
    pub distance_km: f64,
    pub eta_minutes: u32,

    pub fare: Fare,
    pub payment_status: PaymentStatus,
    pub order_id: Option<String>,
    pub notes: Option<String>,

    pub timeline: Vec<StatusChange>,
    pub rating: Option<BookingRating>,
    pub cancellation_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn involves_user(&self, user_id: &str, driver_profile_id: Option<&str>) -> bool {
        self.customer_id == user_id
            || matches!((self.driver_id.as_deref(), driver_profile_id), (Some(a), Some(b)) if a == b)
    }
}

// Request/Response Models
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingRequest {
    pub pickup: Stop,
    pub dropoff: Option<Stop>,
    pub details: BookingDetails,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingQuote {
    pub kind: BookingKind,
    pub zone_id: Option<String>,
    pub distance_km: f64,
    pub eta_minutes: u32,
    pub fare: Fare,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateRequest {
    pub score: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub kind: Option<BookingKind>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AvailableBooking {
    pub booking: Booking,
    pub distance_to_pickup_km: f64,
    pub minutes_to_pickup: u32,
}

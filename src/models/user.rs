// src/models/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Customer, // Books rides, deliveries and orders
    Driver,   // Any kind of driver, rider, mover or responder
    Merchant, // Owns marketplace places
    Partner,  // Integrates over webhooks
    Admin,    // Platform administrator
}

impl UserRole {
    /// Roles a caller may pick for themselves when registering.
    pub fn is_self_registrable(&self) -> bool {
        !matches!(self, UserRole::Admin)
    }

    /// Roles allowed to request bookings.
    pub fn can_book(&self) -> bool {
        matches!(self, UserRole::Customer | UserRole::Merchant | UserRole::Partner | UserRole::Admin)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Suspended,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub email: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub device_tokens: Vec<String>, // For push notifications
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

// Request/Response Models
#[derive(Debug, Serialize, Deserialize)]
pub struct UserRegistration {
    pub role: UserRole,
    pub email: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub device_token: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceTokenRequest {
    pub device_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserStatusUpdate {
    pub status: UserStatus,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserResponse {
    pub id: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub email: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            status: user.status,
            email: user.email,
            phone_number: user.phone_number,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub user: UserResponse,
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub user_id: String,
    pub access_token: String,
}

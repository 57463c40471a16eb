// src/models/subscription.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::UserRole;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanAudience {
    Customer,
    Driver,
    Merchant,
}

impl PlanAudience {
    pub fn matches(&self, role: UserRole) -> bool {
        matches!(
            (self, role),
            (PlanAudience::Customer, UserRole::Customer)
                | (PlanAudience::Driver, UserRole::Driver)
                | (PlanAudience::Merchant, UserRole::Merchant)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubscriptionPlan {
    pub id: String,
    pub name: String,
    pub audience: PlanAudience,
    pub price: f64,
    pub currency: String,
    pub period_days: u32,
    pub discount_percent: f64, // Applied to customer fares
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub discount_percent: f64,
    pub payment_reference: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && now < self.expires_at
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanCreate {
    pub name: String,
    pub audience: PlanAudience,
    pub price: f64,
    pub period_days: u32,
    #[serde(default)]
    pub discount_percent: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub plan_id: String,
    pub payment_reference: String,
}

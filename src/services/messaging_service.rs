// src/services/messaging_service.rs
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::{
    errors::{HaulwayError as AppError, HaulwayResult},
    models::{
        booking::{Booking, BookingKind, BookingStatus},
        user::User,
    },
    services::store_service::{StoreKeys, StoreService},
};

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub fcm_server_key: String,
    pub fcm_url: String,
}

impl FcmConfig {
    pub fn with_server_key(server_key: String) -> Self {
        Self {
            fcm_server_key: server_key,
            fcm_url: "https://fcm.googleapis.com/fcm/send".to_string(),
        }
    }
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_to_device(&self, device_token: &str, message: &NotificationMessage) -> HaulwayResult<()>;
    async fn send_to_user(&self, user_id: &str, message: NotificationMessage) -> HaulwayResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    pub data: Option<serde_json::Value>,
    pub priority: NotificationPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NotificationPriority {
    Normal,
    #[default]
    High, // Will wake sleeping devices
}

pub struct FcmNotificationService {
    config: FcmConfig,
    client: reqwest::Client,
    store: Arc<StoreService>,
}

impl FcmNotificationService {
    pub fn new(config: FcmConfig, store: Arc<StoreService>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            store,
        }
    }
}

#[async_trait]
impl NotificationService for FcmNotificationService {
    async fn send_to_device(&self, device_token: &str, message: &NotificationMessage) -> HaulwayResult<()> {
        if device_token.is_empty() {
            return Err(AppError::FcmInvalidToken("Empty device token".to_string()));
        }

        tracing::debug!("Sending FCM notification to device: {}", device_token);

        let mut fcm_message = json!({
            "to": device_token,
            "notification": {
                "title": message.title,
                "body": message.body,
                "sound": "default"
            },
            "priority": match message.priority {
                NotificationPriority::High => "high",
                NotificationPriority::Normal => "normal",
            }
        });

        if let Some(data) = &message.data {
            fcm_message["data"] = data.clone();
        }

        let response = self
            .client
            .post(&self.config.fcm_url)
            .header("Authorization", format!("key={}", self.config.fcm_server_key))
            .json(&fcm_message)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("FCM request failed: {}", error_text);
            return Err(AppError::FcmDelivery(error_text));
        }

        Ok(())
    }

    async fn send_to_user(&self, user_id: &str, message: NotificationMessage) -> HaulwayResult<()> {
        let user: User = self
            .store
            .get(&StoreKeys::user_by_id(user_id))
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        if user.device_tokens.is_empty() {
            tracing::debug!("User {} has no device tokens, skipping push", user_id);
            return Ok(());
        }

        for token in &user.device_tokens {
            if let Err(e) = self.send_to_device(token, &message).await {
                tracing::warn!("Push to one device of user {} failed: {}", user_id, e);
            }
        }
        Ok(())
    }
}

// Mock service for development and testing
#[derive(Debug, Default)]
pub struct MockNotificationService;

#[async_trait]
impl NotificationService for MockNotificationService {
    async fn send_to_device(&self, device_token: &str, message: &NotificationMessage) -> HaulwayResult<()> {
        tracing::info!("[MOCK] Would send FCM to {}: {} - {}", device_token, message.title, message.body);
        Ok(())
    }

    async fn send_to_user(&self, user_id: &str, message: NotificationMessage) -> HaulwayResult<()> {
        tracing::info!("[MOCK] Would send to user {}: {} - {}", user_id, message.title, message.body);
        Ok(())
    }
}

impl NotificationMessage {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            data: None,
            priority: NotificationPriority::default(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }
}

fn kind_noun(kind: BookingKind) -> &'static str {
    match kind {
        BookingKind::Ride => "ride",
        BookingKind::Taxi => "taxi",
        BookingKind::Delivery => "delivery",
        BookingKind::Moving => "move",
        BookingKind::Emergency => "emergency request",
    }
}

/// Push sent to the customer when their booking changes status.
pub fn customer_booking_message(booking: &Booking) -> Option<NotificationMessage> {
    let noun = kind_noun(booking.kind);
    let (title, body) = match booking.status {
        BookingStatus::DriverAssigned => ("Driver assigned".to_string(), format!("A driver accepted your {}", noun)),
        BookingStatus::DriverArrived => ("Driver arrived".to_string(), "Your driver is at the pickup point".to_string()),
        BookingStatus::InProgress => ("On the way".to_string(), format!("Your {} is in progress", noun)),
        BookingStatus::Completed => (
            "Completed".to_string(),
            format!("Your {} is complete. Total {:.2} {}", noun, booking.fare.total, booking.fare.currency),
        ),
        BookingStatus::Cancelled => ("Cancelled".to_string(), format!("Your {} was cancelled", noun)),
        BookingStatus::Pending => return None,
    };

    Some(
        NotificationMessage::new(&title, &body)
            .with_data(json!({
                "type": "booking_status",
                "booking_id": booking.id,
                "status": booking.status,
            }))
            .with_priority(match booking.status {
                BookingStatus::DriverAssigned | BookingStatus::DriverArrived => NotificationPriority::High,
                _ => NotificationPriority::Normal,
            }),
    )
}

/// Push sent to the assigned driver. Only events the driver did not trigger themselves.
pub fn driver_booking_message(booking: &Booking) -> Option<NotificationMessage> {
    let (title, body) = match booking.status {
        BookingStatus::DriverAssigned if booking.kind == BookingKind::Emergency => (
            "Emergency dispatch",
            format!("You were dispatched to {}", booking.pickup.address),
        ),
        BookingStatus::Cancelled => ("Booking cancelled", format!("Booking {} was cancelled", booking.id)),
        _ => return None,
    };

    Some(
        NotificationMessage::new(title, &body).with_data(json!({
            "type": "booking_status",
            "booking_id": booking.id,
            "status": booking.status,
        })),
    )
}

// src/services/realtime_service.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeEvent {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// In-process fan-out for socket clients. Each socket filters by its own channel set.
pub struct RealtimeHub {
    tx: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, channel: impl Into<String>, event: &str, payload: serde_json::Value) {
        let event = RealtimeEvent {
            channel: channel.into(),
            event: event.to_string(),
            payload,
            at: Utc::now(),
        };
        // No receivers just means nobody is connected
        if self.tx.send(event).is_err() {
            tracing::trace!("No realtime subscribers");
        }
    }

    pub fn connected_clients(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Channels;

impl Channels {
    pub fn user(user_id: &str) -> String {
        format!("user:{}", user_id)
    }

    pub fn driver(driver_id: &str) -> String {
        format!("driver:{}", driver_id)
    }

    pub fn booking(booking_id: &str) -> String {
        format!("booking:{}", booking_id)
    }

    pub fn zone(zone_id: &str) -> String {
        format!("zone:{}", zone_id)
    }

    /// Responders outside every zone listen here for zone-less emergencies.
    pub fn emergency() -> String {
        "zone:emergency".to_string()
    }
}

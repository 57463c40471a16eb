// src/models/webhook.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebhookEndpoint {
    pub id: String,
    pub owner_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub secret: String,
    pub events: Vec<String>, // Event names, or "*" for everything
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl WebhookEndpoint {
    pub fn wants(&self, event: &str) -> bool {
        self.active && self.events.iter().any(|e| e == "*" || e == event)
    }

    /// Copy safe to show the owner after creation.
    pub fn redacted(&self) -> Self {
        Self {
            secret: String::new(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookCreate {
    pub url: String,
    pub events: Vec<String>,
    pub secret: Option<String>,
}

/// Body POSTed to webhook endpoints.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebhookEnvelope {
    pub id: String,
    pub event: String,
    pub created_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

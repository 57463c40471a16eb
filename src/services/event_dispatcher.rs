// src/services/event_dispatcher.rs
use std::sync::Arc;

use crate::services::{
    messaging_service::{NotificationMessage, NotificationService},
    realtime_service::RealtimeHub,
    webhook_service::WebhookService,
};

/// One domain happening and everywhere it should be announced.
#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub name: String,
    pub payload: serde_json::Value,
    pub channels: Vec<String>,
    pub pushes: Vec<(String, NotificationMessage)>,
    pub webhook: bool,
}

impl DomainEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
            channels: Vec::new(),
            pushes: Vec::new(),
            webhook: true,
        }
    }

    pub fn on_channel(mut self, channel: impl Into<String>) -> Self {
        let channel = channel.into();
        if !self.channels.contains(&channel) {
            self.channels.push(channel);
        }
        self
    }

    pub fn push_to(mut self, user_id: impl Into<String>, message: Option<NotificationMessage>) -> Self {
        if let Some(message) = message {
            self.pushes.push((user_id.into(), message));
        }
        self
    }

    pub fn without_webhook(mut self) -> Self {
        self.webhook = false;
        self
    }
}

pub struct EventDispatcher {
    realtime: Arc<RealtimeHub>,
    notifier: Arc<dyn NotificationService>,
    webhooks: Arc<WebhookService>,
}

impl EventDispatcher {
    pub fn new(
        realtime: Arc<RealtimeHub>,
        notifier: Arc<dyn NotificationService>,
        webhooks: Arc<WebhookService>,
    ) -> Self {
        Self {
            realtime,
            notifier,
            webhooks,
        }
    }

    pub fn realtime(&self) -> &Arc<RealtimeHub> {
        &self.realtime
    }

    /// Fan out to sockets now, push and webhooks in the background. Never fails the caller.
    pub fn publish(&self, event: DomainEvent) {
        tracing::debug!("Dispatching {} to {} channel(s)", event.name, event.channels.len());

        for channel in &event.channels {
            self.realtime.publish(channel.clone(), &event.name, event.payload.clone());
        }

        for (user_id, message) in event.pushes {
            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(async move {
                if let Err(e) = notifier.send_to_user(&user_id, message).await {
                    tracing::warn!("Push to user {} failed: {}", user_id, e);
                }
            });
        }

        if event.webhook {
            let webhooks = Arc::clone(&self.webhooks);
            let name = event.name;
            let payload = event.payload;
            tokio::spawn(async move {
                match webhooks.dispatch(&name, payload).await {
                    Ok(0) => {}
                    Ok(delivered) => tracing::debug!("{} delivered to {} webhook(s)", name, delivered),
                    Err(e) => tracing::warn!("Webhook fan-out for {} failed: {}", name, e),
                }
            });
        }
    }
}

// src/services/webhook_service.rs
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::MAX_WEBHOOK_ATTEMPTS,
    errors::{HaulwayError as AppError, HaulwayResult, Validator},
    models::{
        user::{User, UserRole},
        webhook::{WebhookCreate, WebhookEndpoint, WebhookEnvelope},
    },
    services::store_service::{StoreKeys, StoreService},
    utils::id_generator::{IdGenerator, IdType, generate_token},
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Haulway-Signature";
pub const EVENT_HEADER: &str = "X-Haulway-Event";

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

pub struct WebhookService {
    store: Arc<StoreService>,
    client: reqwest::Client,
    config: WebhookConfig,
}

/// `sha256=<hex>` HMAC of the exact request body.
pub fn sign_payload(secret: &str, body: &[u8]) -> HaulwayResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::internal_error(format!("webhook signing key rejected: {}", e)))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

impl WebhookService {
    pub fn new(store: Arc<StoreService>, mut config: WebhookConfig) -> HaulwayResult<Self> {
        config.max_attempts = config.max_attempts.clamp(1, MAX_WEBHOOK_ATTEMPTS);
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { store, client, config })
    }

    /// Wait before retry `attempt` (1-based): base, 2x base, 4x base, ...
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(MAX_WEBHOOK_ATTEMPTS);
        self.config.base_backoff.saturating_mul(factor)
    }

    pub async fn register(&self, owner: &User, request: WebhookCreate) -> HaulwayResult<WebhookEndpoint> {
        if !matches!(owner.role, UserRole::Partner | UserRole::Merchant | UserRole::Admin) {
            return Err(AppError::InsufficientPermissions);
        }

        let url_ok = request.url.starts_with("https://") || request.url.starts_with("http://");
        Validator::new()
            .check(url_ok, "url", "must be an http or https URL")
            .check(!request.events.is_empty(), "events", "must list at least one event or \"*\"")
            .check(
                request.events.iter().all(|e| !e.trim().is_empty()),
                "events",
                "event names must not be blank",
            )
            .finish()?;

        let endpoint = WebhookEndpoint {
            id: IdGenerator::generate(IdType::Webhook),
            owner_id: owner.id.clone(),
            url: request.url,
            secret: request
                .secret
                .filter(|s| !s.is_empty())
                .unwrap_or_else(generate_token),
            events: request.events,
            active: true,
            created_at: Utc::now(),
        };

        self.store.put(&StoreKeys::webhook_by_id(&endpoint.id), &endpoint).await?;
        self.store.sadd(&StoreKeys::all_webhooks(), &endpoint.id).await?;
        self.store
            .sadd(&StoreKeys::webhooks_by_owner(&owner.id), &endpoint.id)
            .await?;

        tracing::info!("Webhook {} registered for {} ({:?})", endpoint.id, owner.id, endpoint.events);
        Ok(endpoint)
    }

    pub async fn list_for_owner(&self, owner_id: &str) -> HaulwayResult<Vec<WebhookEndpoint>> {
        let mut endpoints: Vec<WebhookEndpoint> = self
            .store
            .load_all(&StoreKeys::webhooks_by_owner(owner_id), StoreKeys::webhook_by_id)
            .await?;
        endpoints.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(endpoints.iter().map(WebhookEndpoint::redacted).collect())
    }

    pub async fn delete(&self, owner: &User, webhook_id: &str) -> HaulwayResult<()> {
        let endpoint: WebhookEndpoint = self
            .store
            .get(&StoreKeys::webhook_by_id(webhook_id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Webhook {}", webhook_id)))?;

        if endpoint.owner_id != owner.id && !owner.is_admin() {
            return Err(AppError::not_found(format!("Webhook {}", webhook_id)));
        }

        self.store.delete(&StoreKeys::webhook_by_id(webhook_id)).await?;
        self.store.srem(&StoreKeys::all_webhooks(), webhook_id).await?;
        self.store
            .srem(&StoreKeys::webhooks_by_owner(&endpoint.owner_id), webhook_id)
            .await?;

        tracing::info!("Webhook {} deleted", webhook_id);
        Ok(())
    }

    pub async fn subscribers(&self, event: &str) -> HaulwayResult<Vec<WebhookEndpoint>> {
        let endpoints: Vec<WebhookEndpoint> = self
            .store
            .load_all(&StoreKeys::all_webhooks(), StoreKeys::webhook_by_id)
            .await?;
        Ok(endpoints.into_iter().filter(|e| e.wants(event)).collect())
    }

    /// Deliver an event to every subscribed endpoint. Failures are logged per endpoint.
    pub async fn dispatch(&self, event: &str, data: serde_json::Value) -> HaulwayResult<usize> {
        let endpoints = self.subscribers(event).await?;
        if endpoints.is_empty() {
            return Ok(0);
        }

        let envelope = WebhookEnvelope {
            id: IdGenerator::generate(IdType::Event),
            event: event.to_string(),
            created_at: Utc::now(),
            data,
        };
        let body = serde_json::to_vec(&envelope)?;

        let mut delivered = 0;
        for endpoint in &endpoints {
            match self.deliver(endpoint, event, &body).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!("Webhook {} gave up on {}: {}", endpoint.id, event, e),
            }
        }
        Ok(delivered)
    }

    async fn deliver(&self, endpoint: &WebhookEndpoint, event: &str, body: &[u8]) -> HaulwayResult<()> {
        let signature = sign_payload(&endpoint.secret, body)?;
        let mut last_error = None;

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff(attempt)).await;
            }

            let result = self
                .client
                .post(&endpoint.url)
                .header("Content-Type", "application/json")
                .header(EVENT_HEADER, event)
                .header(SIGNATURE_HEADER, &signature)
                .body(body.to_vec())
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!("Webhook {} accepted {} on attempt {}", endpoint.id, event, attempt + 1);
                    return Ok(());
                }
                Ok(response) => {
                    last_error = Some(format!("status {}", response.status()));
                }
                Err(e) => {
                    last_error = Some(AppError::from(e).to_string());
                }
            }
        }

        Err(AppError::WebhookDelivery(last_error.unwrap_or_else(|| "no attempts made".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserStatus;

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: IdGenerator::generate(IdType::User),
            role,
            status: UserStatus::Active,
            email: "p@example.com".into(),
            phone_number: "+233200000000".into(),
            first_name: "Esi".into(),
            last_name: "Mensah".into(),
            device_tokens: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn service() -> WebhookService {
        WebhookService::new(Arc::new(StoreService::memory()), WebhookConfig::default()).unwrap()
    }

    #[test]
    fn test_signature_is_stable_hmac() {
        // RFC 4231 test case 2
        let sig = sign_payload("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[tokio::test]
    async fn test_register_and_filter_subscribers() {
        let svc = service();
        let partner = user(UserRole::Partner);

        let created = svc
            .register(
                &partner,
                WebhookCreate {
                    url: "https://partner.example.com/hooks".into(),
                    events: vec!["booking.completed".into()],
                    secret: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.secret.len(), 32);

        assert_eq!(svc.subscribers("booking.completed").await.unwrap().len(), 1);
        assert!(svc.subscribers("order.placed").await.unwrap().is_empty());

        let listed = svc.list_for_owner(&partner.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].secret.is_empty());
    }

    #[tokio::test]
    async fn test_customers_cannot_register_and_urls_are_checked() {
        let svc = service();
        let request = || WebhookCreate {
            url: "ftp://nope".into(),
            events: vec!["*".into()],
            secret: None,
        };

        assert!(matches!(
            svc.register(&user(UserRole::Customer), request()).await,
            Err(AppError::InsufficientPermissions)
        ));
        assert!(matches!(
            svc.register(&user(UserRole::Partner), request()).await,
            Err(AppError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_only_owner_deletes() {
        let svc = service();
        let owner = user(UserRole::Merchant);
        let other = user(UserRole::Partner);
        let created = svc
            .register(
                &owner,
                WebhookCreate {
                    url: "https://m.example.com".into(),
                    events: vec!["*".into()],
                    secret: Some("s3cret".into()),
                },
            )
            .await
            .unwrap();

        assert!(svc.delete(&other, &created.id).await.is_err());
        svc.delete(&owner, &created.id).await.unwrap();
        assert!(svc.subscribers("anything").await.unwrap().is_empty());
    }

    #[test]
    fn test_attempts_are_capped_and_backoff_doubles() {
        let svc = WebhookService::new(
            Arc::new(StoreService::memory()),
            WebhookConfig {
                max_attempts: 40,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(svc.config.max_attempts, MAX_WEBHOOK_ATTEMPTS);

        assert_eq!(svc.backoff(1), Duration::from_millis(500));
        assert_eq!(svc.backoff(3), Duration::from_millis(2000));
        assert_eq!(svc.backoff(u32::MAX), Duration::from_millis(500) * 1024);
    }

    #[tokio::test]
    async fn test_dispatch_without_subscribers_sends_nothing() {
        let svc = service();
        assert_eq!(svc.dispatch("booking.pending", serde_json::json!({})).await.unwrap(), 0);
    }
}

// src/services/store_service.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::errors::{HaulwayError, HaulwayResult};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub redis_url: Option<String>,
}

// Key strategies
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Simple(String),
    Composite(Vec<String>),
}

impl StoreKey {
    pub fn render(&self) -> String {
        match self {
            StoreKey::Simple(key) => key.clone(),
            StoreKey::Composite(parts) => parts.join(":"),
        }
    }
}

fn composite(parts: &[&str]) -> StoreKey {
    StoreKey::Composite(parts.iter().map(|p| p.to_string()).collect())
}

// Key generators for every record family
pub struct StoreKeys;

impl StoreKeys {
    pub fn user_by_id(user_id: &str) -> StoreKey {
        composite(&["user", "id", user_id])
    }

    pub fn user_by_email(email: &str) -> StoreKey {
        composite(&["user", "email", &email.to_lowercase()])
    }

    pub fn user_by_phone(phone: &str) -> StoreKey {
        composite(&["user", "phone", phone])
    }

    pub fn all_users() -> StoreKey {
        StoreKey::Simple("users:all".to_string())
    }

    pub fn token(token: &str) -> StoreKey {
        composite(&["token", token])
    }

    pub fn driver_by_id(driver_id: &str) -> StoreKey {
        composite(&["driver", "id", driver_id])
    }

    pub fn driver_by_user_id(user_id: &str) -> StoreKey {
        composite(&["driver", "user_id", user_id])
    }

    pub fn all_drivers() -> StoreKey {
        StoreKey::Simple("drivers:all".to_string())
    }

    pub fn online_drivers() -> StoreKey {
        StoreKey::Simple("drivers:online".to_string())
    }

    pub fn booking_by_id(booking_id: &str) -> StoreKey {
        composite(&["booking", "id", booking_id])
    }

    pub fn all_bookings() -> StoreKey {
        StoreKey::Simple("bookings:all".to_string())
    }

    pub fn pending_bookings() -> StoreKey {
        StoreKey::Simple("bookings:pending".to_string())
    }

    pub fn bookings_by_customer(customer_id: &str) -> StoreKey {
        composite(&["bookings", "customer", customer_id])
    }

    pub fn bookings_by_driver(driver_id: &str) -> StoreKey {
        composite(&["bookings", "driver", driver_id])
    }

    pub fn zone_by_id(zone_id: &str) -> StoreKey {
        composite(&["zone", "id", zone_id])
    }

    pub fn all_zones() -> StoreKey {
        StoreKey::Simple("zones:all".to_string())
    }

    pub fn place_by_id(place_id: &str) -> StoreKey {
        composite(&["place", "id", place_id])
    }

    pub fn all_places() -> StoreKey {
        StoreKey::Simple("places:all".to_string())
    }

    pub fn places_by_owner(owner_id: &str) -> StoreKey {
        composite(&["places", "owner", owner_id])
    }

    pub fn order_by_id(order_id: &str) -> StoreKey {
        composite(&["order", "id", order_id])
    }

    pub fn orders_by_customer(customer_id: &str) -> StoreKey {
        composite(&["orders", "customer", customer_id])
    }

    pub fn orders_by_place(place_id: &str) -> StoreKey {
        composite(&["orders", "place", place_id])
    }

    pub fn plan_by_id(plan_id: &str) -> StoreKey {
        composite(&["plan", "id", plan_id])
    }

    pub fn all_plans() -> StoreKey {
        StoreKey::Simple("plans:all".to_string())
    }

    pub fn subscription_by_id(subscription_id: &str) -> StoreKey {
        composite(&["subscription", "id", subscription_id])
    }

    pub fn subscriptions_by_user(user_id: &str) -> StoreKey {
        composite(&["subscriptions", "user", user_id])
    }

    pub fn webhook_by_id(webhook_id: &str) -> StoreKey {
        composite(&["webhook", "id", webhook_id])
    }

    pub fn all_webhooks() -> StoreKey {
        StoreKey::Simple("webhooks:all".to_string())
    }

    pub fn webhooks_by_owner(owner_id: &str) -> StoreKey {
        composite(&["webhooks", "owner", owner_id])
    }
}

// ------------------------------
// Backend traits
// ------------------------------

#[async_trait]
pub trait KeyOperations: Send + Sync {
    async fn get_raw(&self, key: &StoreKey) -> Result<Option<String>, StoreError>;
    async fn set_raw(&self, key: &StoreKey, value: String, ttl: Option<u64>) -> Result<(), StoreError>;
    async fn delete(&self, key: &StoreKey) -> Result<(), StoreError>;
    async fn exists(&self, key: &StoreKey) -> Result<bool, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SetOperations: Send + Sync {
    async fn sadd(&self, key: &StoreKey, value: &str) -> Result<(), StoreError>;
    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError>;
    async fn srem(&self, key: &StoreKey, value: &str) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Operation error: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<StoreError> for HaulwayError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ConnectionError(msg) => HaulwayError::StoreConnection(msg),
            StoreError::OperationError(msg) => HaulwayError::StoreQuery(msg),
            StoreError::SerializationError(msg) => HaulwayError::StoreSerialization(msg),
        }
    }
}

// -------- Redis --------

pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        Ok(Self { client })
    }

    async fn get_connection(&self) -> Result<redis::aio::Connection, StoreError> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))
    }
}

fn op_err(e: redis::RedisError) -> StoreError {
    StoreError::OperationError(e.to_string())
}

#[async_trait]
impl KeyOperations for RedisStore {
    async fn get_raw(&self, key: &StoreKey) -> Result<Option<String>, StoreError> {
        let mut conn = self.get_connection().await?;
        redis::cmd("GET")
            .arg(key.render())
            .query_async(&mut conn)
            .await
            .map_err(op_err)
    }

    async fn set_raw(&self, key: &StoreKey, value: String, ttl: Option<u64>) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key.render()).arg(value);
        if let Some(ttl) = ttl.filter(|t| *t > 0) {
            cmd.arg("EX").arg(ttl);
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(op_err)?;
        Ok(())
    }

    async fn delete(&self, key: &StoreKey) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let _: () = redis::cmd("DEL")
            .arg(key.render())
            .query_async(&mut conn)
            .await
            .map_err(op_err)?;
        Ok(())
    }

    async fn exists(&self, key: &StoreKey) -> Result<bool, StoreError> {
        let mut conn = self.get_connection().await?;
        redis::cmd("EXISTS")
            .arg(key.render())
            .query_async(&mut conn)
            .await
            .map_err(op_err)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(op_err)?;
        Ok(())
    }
}

#[async_trait]
impl SetOperations for RedisStore {
    async fn sadd(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let _: () = redis::cmd("SADD")
            .arg(key.render())
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(op_err)?;
        Ok(())
    }

    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError> {
        let mut conn = self.get_connection().await?;
        redis::cmd("SMEMBERS")
            .arg(key.render())
            .query_async(&mut conn)
            .await
            .map_err(op_err)
    }

    async fn srem(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let _: () = redis::cmd("SREM")
            .arg(key.render())
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(op_err)?;
        Ok(())
    }
}

// -------- Memory (development and tests) --------

#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, (String, Option<DateTime<Utc>>)>>,
    sets: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_expired(expires_at: Option<DateTime<Utc>>) -> bool {
        expires_at.is_some_and(|expiry| Utc::now() > expiry)
    }
}

#[async_trait]
impl KeyOperations for MemoryStore {
    async fn get_raw(&self, key: &StoreKey) -> Result<Option<String>, StoreError> {
        let values = self.values.read().await;
        Ok(values
            .get(&key.render())
            .filter(|(_, expiry)| !Self::is_expired(*expiry))
            .map(|(json, _)| json.clone()))
    }

    async fn set_raw(&self, key: &StoreKey, value: String, ttl: Option<u64>) -> Result<(), StoreError> {
        let expires_at = ttl
            .filter(|t| *t > 0)
            .map(|seconds| Utc::now() + chrono::Duration::seconds(seconds as i64));
        self.values.write().await.insert(key.render(), (value, expires_at));
        Ok(())
    }

    async fn delete(&self, key: &StoreKey) -> Result<(), StoreError> {
        let rendered = key.render();
        self.values.write().await.remove(&rendered);
        self.sets.write().await.remove(&rendered);
        Ok(())
    }

    async fn exists(&self, key: &StoreKey) -> Result<bool, StoreError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl SetOperations for MemoryStore {
    async fn sadd(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        self.sets
            .write()
            .await
            .entry(key.render())
            .or_default()
            .insert(value.to_string());
        Ok(())
    }

    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError> {
        let sets = self.sets.read().await;
        Ok(sets
            .get(&key.render())
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn srem(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        if let Some(members) = self.sets.write().await.get_mut(&key.render()) {
            members.remove(value);
        }
        Ok(())
    }
}

// ------------------------------
// Enum delegation
// ------------------------------

pub enum Store {
    Redis(RedisStore),
    Memory(MemoryStore),
}

#[async_trait]
impl KeyOperations for Store {
    async fn get_raw(&self, key: &StoreKey) -> Result<Option<String>, StoreError> {
        match self {
            Store::Redis(store) => store.get_raw(key).await,
            Store::Memory(store) => store.get_raw(key).await,
        }
    }

    async fn set_raw(&self, key: &StoreKey, value: String, ttl: Option<u64>) -> Result<(), StoreError> {
        match self {
            Store::Redis(store) => store.set_raw(key, value, ttl).await,
            Store::Memory(store) => store.set_raw(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &StoreKey) -> Result<(), StoreError> {
        match self {
            Store::Redis(store) => store.delete(key).await,
            Store::Memory(store) => store.delete(key).await,
        }
    }

    async fn exists(&self, key: &StoreKey) -> Result<bool, StoreError> {
        match self {
            Store::Redis(store) => store.exists(key).await,
            Store::Memory(store) => store.exists(key).await,
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Store::Redis(store) => store.ping().await,
            Store::Memory(store) => store.ping().await,
        }
    }
}

#[async_trait]
impl SetOperations for Store {
    async fn sadd(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        match self {
            Store::Redis(store) => store.sadd(key, value).await,
            Store::Memory(store) => store.sadd(key, value).await,
        }
    }

    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError> {
        match self {
            Store::Redis(store) => store.smembers(key).await,
            Store::Memory(store) => store.smembers(key).await,
        }
    }

    async fn srem(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        match self {
            Store::Redis(store) => store.srem(key, value).await,
            Store::Memory(store) => store.srem(key, value).await,
        }
    }
}

// ------------------------------
// Typed service wrapper
// ------------------------------

pub struct StoreService {
    store: Store,
}

impl StoreService {
    pub fn new(config: &StoreConfig) -> HaulwayResult<Self> {
        let store = match &config.redis_url {
            Some(url) => {
                tracing::info!("Using redis store at {}", url);
                Store::Redis(RedisStore::new(url)?)
            }
            None => {
                tracing::warn!("REDIS_URL not set, using in-memory store");
                Store::Memory(MemoryStore::new())
            }
        };
        Ok(Self { store })
    }

    pub fn memory() -> Self {
        Self {
            store: Store::Memory(MemoryStore::new()),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &StoreKey) -> HaulwayResult<Option<T>> {
        match self.store.get_raw(key).await? {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| StoreError::SerializationError(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn put<T: Serialize + Sync>(&self, key: &StoreKey, value: &T) -> HaulwayResult<()> {
        self.put_with_ttl(key, value, None).await
    }

    pub async fn put_with_ttl<T: Serialize + Sync>(
        &self,
        key: &StoreKey,
        value: &T,
        ttl: Option<u64>,
    ) -> HaulwayResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        self.store.set_raw(key, json, ttl).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &StoreKey) -> HaulwayResult<()> {
        Ok(self.store.delete(key).await?)
    }

    pub async fn exists(&self, key: &StoreKey) -> HaulwayResult<bool> {
        Ok(self.store.exists(key).await?)
    }

    pub async fn sadd(&self, key: &StoreKey, value: &str) -> HaulwayResult<()> {
        Ok(self.store.sadd(key, value).await?)
    }

    pub async fn smembers(&self, key: &StoreKey) -> HaulwayResult<Vec<String>> {
        Ok(self.store.smembers(key).await?)
    }

    pub async fn srem(&self, key: &StoreKey, value: &str) -> HaulwayResult<()> {
        Ok(self.store.srem(key, value).await?)
    }

    /// Resolve every id in an index set into its record. Dangling ids are skipped.
    pub async fn load_all<T, F>(&self, index: &StoreKey, record_key: F) -> HaulwayResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> StoreKey,
    {
        let ids = self.smembers(index).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get::<T>(&record_key(&id)).await? {
                Some(record) => records.push(record),
                None => tracing::debug!("Index {} points at missing record {}", index.render(), id),
            }
        }
        Ok(records)
    }

    pub async fn health_check(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Store health check failed: {}", e);
                false
            }
        }
    }
}

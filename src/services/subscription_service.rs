// src/services/subscription_service.rs
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    errors::{HaulwayError as AppError, HaulwayResult, Validator},
    models::{
        subscription::{PlanCreate, SubscribeRequest, Subscription, SubscriptionPlan, SubscriptionStatus},
        user::User,
    },
    services::store_service::{StoreKeys, StoreService},
    utils::id_generator::{IdGenerator, IdType},
};

pub struct SubscriptionService {
    store: Arc<StoreService>,
    currency: String,
    /// Held from the "already subscribed?" check until the new subscription is stored.
    write_lock: Mutex<()>,
}

impl SubscriptionService {
    pub fn new(store: Arc<StoreService>, currency: String) -> Self {
        Self {
            store,
            currency,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn create_plan(&self, request: PlanCreate) -> HaulwayResult<SubscriptionPlan> {
        Validator::new()
            .require_text(&request.name, "name")
            .check(request.price >= 0.0, "price", "must not be negative")
            .check(request.period_days >= 1, "period_days", "must be at least 1")
            .check(
                (0.0..=100.0).contains(&request.discount_percent),
                "discount_percent",
                "must be between 0 and 100",
            )
            .finish()?;

        let plan = SubscriptionPlan {
            id: IdGenerator::generate(IdType::Plan),
            name: request.name.trim().to_string(),
            audience: request.audience,
            price: request.price,
            currency: self.currency.clone(),
            period_days: request.period_days,
            discount_percent: request.discount_percent,
            active: true,
            created_at: Utc::now(),
        };

        self.store.put(&StoreKeys::plan_by_id(&plan.id), &plan).await?;
        self.store.sadd(&StoreKeys::all_plans(), &plan.id).await?;

        tracing::info!("Subscription plan created: {} ({:?})", plan.id, plan.audience);
        Ok(plan)
    }

    pub async fn get_plan(&self, plan_id: &str) -> HaulwayResult<SubscriptionPlan> {
        if !IdGenerator::validate_id(plan_id, Some(IdType::Plan)) {
            return Err(AppError::PlanNotFound(plan_id.to_string()));
        }
        self.store
            .get(&StoreKeys::plan_by_id(plan_id))
            .await?
            .ok_or_else(|| AppError::PlanNotFound(plan_id.to_string()))
    }

    pub async fn deactivate_plan(&self, plan_id: &str) -> HaulwayResult<SubscriptionPlan> {
        let mut plan = self.get_plan(plan_id).await?;
        plan.active = false;
        self.store.put(&StoreKeys::plan_by_id(&plan.id), &plan).await?;
        tracing::info!("Subscription plan deactivated: {}", plan.id);
        Ok(plan)
    }

    /// Active plans, cheapest first.
    pub async fn list_active_plans(&self) -> HaulwayResult<Vec<SubscriptionPlan>> {
        let mut plans: Vec<SubscriptionPlan> = self
            .store
            .load_all(&StoreKeys::all_plans(), StoreKeys::plan_by_id)
            .await?;
        plans.retain(|p| p.active);
        plans.sort_by(|a, b| a.price.total_cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    pub async fn subscribe(&self, user: &User, request: SubscribeRequest) -> HaulwayResult<Subscription> {
        let plan = self.get_plan(&request.plan_id).await?;

        if !plan.active {
            return Err(AppError::bad_request("Plan is no longer offered"));
        }
        if !plan.audience.matches(user.role) {
            return Err(AppError::forbidden(format!(
                "Plan {} is for {:?} accounts",
                plan.id, plan.audience
            )));
        }
        Validator::new()
            .require_text(&request.payment_reference, "payment_reference")
            .finish()?;

        let _guard = self.write_lock.lock().await;
        if self.current(&user.id).await?.is_some() {
            return Err(AppError::conflict("An active subscription already exists"));
        }

        let now = Utc::now();
        let subscription = Subscription {
            id: IdGenerator::generate(IdType::Subscription),
            user_id: user.id.clone(),
            plan_id: plan.id.clone(),
            status: SubscriptionStatus::Active,
            discount_percent: plan.discount_percent,
            payment_reference: request.payment_reference.trim().to_string(),
            started_at: now,
            expires_at: now + Duration::days(plan.period_days as i64),
            cancelled_at: None,
        };

        self.store
            .put(&StoreKeys::subscription_by_id(&subscription.id), &subscription)
            .await?;
        self.store
            .sadd(&StoreKeys::subscriptions_by_user(&user.id), &subscription.id)
            .await?;

        tracing::info!(
            "User {} subscribed to {} until {}",
            user.id,
            plan.id,
            subscription.expires_at
        );
        Ok(subscription)
    }

    /// The caller's running subscription. Lapsed ones are persisted as expired on the way.
    pub async fn current(&self, user_id: &str) -> HaulwayResult<Option<Subscription>> {
        let subscriptions: Vec<Subscription> = self
            .store
            .load_all(&StoreKeys::subscriptions_by_user(user_id), StoreKeys::subscription_by_id)
            .await?;

        let now = Utc::now();
        let mut current = None;
        for mut subscription in subscriptions {
            if subscription.is_current(now) {
                current = Some(subscription);
            } else if subscription.status == SubscriptionStatus::Active {
                subscription.status = SubscriptionStatus::Expired;
                self.store
                    .put(&StoreKeys::subscription_by_id(&subscription.id), &subscription)
                    .await?;
                tracing::debug!("Subscription {} expired", subscription.id);
            }
        }
        Ok(current)
    }

    /// Percent off customer fares from the current subscription, or zero.
    pub async fn discount_for(&self, user_id: &str) -> HaulwayResult<f64> {
        Ok(self
            .current(user_id)
            .await?
            .map(|s| s.discount_percent)
            .unwrap_or(0.0))
    }

    pub async fn cancel(&self, user_id: &str) -> HaulwayResult<Subscription> {
        let _guard = self.write_lock.lock().await;
        let mut subscription = self
            .current(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("No active subscription"))?;

        subscription.status = SubscriptionStatus::Cancelled;
        subscription.cancelled_at = Some(Utc::now());
        self.store
            .put(&StoreKeys::subscription_by_id(&subscription.id), &subscription)
            .await?;

        tracing::info!("Subscription {} cancelled", subscription.id);
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        subscription::PlanAudience,
        user::{UserRole, UserStatus},
    };

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: IdGenerator::generate(IdType::User),
            role,
            status: UserStatus::Active,
            email: "x@example.com".into(),
            phone_number: "+233200000001".into(),
            first_name: "Yaw".into(),
            last_name: "Boateng".into(),
            device_tokens: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn plan(audience: PlanAudience, discount: f64) -> PlanCreate {
        PlanCreate {
            name: "Monthly".into(),
            audience,
            price: 50.0,
            period_days: 30,
            discount_percent: discount,
        }
    }

    #[tokio::test]
    async fn test_subscribe_then_duplicate_conflicts() {
        let svc = SubscriptionService::new(Arc::new(StoreService::memory()), "GHS".into());
        let customer = user(UserRole::Customer);
        let plan = svc.create_plan(plan(PlanAudience::Customer, 15.0)).await.unwrap();

        let request = || SubscribeRequest {
            plan_id: plan.id.clone(),
            payment_reference: "PAY-001".into(),
        };

        svc.subscribe(&customer, request()).await.unwrap();
        assert_eq!(svc.discount_for(&customer.id).await.unwrap(), 15.0);
        assert!(matches!(svc.subscribe(&customer, request()).await, Err(AppError::Conflict(_))));

        svc.cancel(&customer.id).await.unwrap();
        assert_eq!(svc.discount_for(&customer.id).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_concurrent_subscribes_leave_one_active() {
        let svc = SubscriptionService::new(Arc::new(StoreService::memory()), "GHS".into());
        let customer = user(UserRole::Customer);
        let plan = svc.create_plan(plan(PlanAudience::Customer, 10.0)).await.unwrap();
        let request = |reference: &str| SubscribeRequest {
            plan_id: plan.id.clone(),
            payment_reference: reference.into(),
        };

        let held = svc.write_lock.lock().await;
        let release = async move {
            tokio::task::yield_now().await;
            drop(held);
        };
        let (first, second, ()) = tokio::join!(
            svc.subscribe(&customer, request("PAY-A")),
            svc.subscribe(&customer, request("PAY-B")),
            release,
        );

        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(first.err().or(second.err()), Some(AppError::Conflict(_))));

        let all: Vec<Subscription> = svc
            .store
            .load_all(&StoreKeys::subscriptions_by_user(&customer.id), StoreKeys::subscription_by_id)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_audience_and_reference_are_enforced() {
        let svc = SubscriptionService::new(Arc::new(StoreService::memory()), "GHS".into());
        let driver_plan = svc.create_plan(plan(PlanAudience::Driver, 0.0)).await.unwrap();

        assert!(matches!(
            svc.subscribe(
                &user(UserRole::Customer),
                SubscribeRequest { plan_id: driver_plan.id.clone(), payment_reference: "P".into() }
            )
            .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            svc.subscribe(
                &user(UserRole::Driver),
                SubscribeRequest { plan_id: driver_plan.id.clone(), payment_reference: " ".into() }
            )
            .await,
            Err(AppError::ValidationFailed(_))
        ));

        svc.deactivate_plan(&driver_plan.id).await.unwrap();
        assert!(svc.list_active_plans().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lapsed_subscription_is_marked_expired() {
        let store = Arc::new(StoreService::memory());
        let svc = SubscriptionService::new(Arc::clone(&store), "GHS".into());
        let driver = user(UserRole::Driver);
        let past = Utc::now() - Duration::days(40);

        let lapsed = Subscription {
            id: IdGenerator::generate(IdType::Subscription),
            user_id: driver.id.clone(),
            plan_id: IdGenerator::generate(IdType::Plan),
            status: SubscriptionStatus::Active,
            discount_percent: 0.0,
            payment_reference: "OLD".into(),
            started_at: past,
            expires_at: past + Duration::days(30),
            cancelled_at: None,
        };
        store.put(&StoreKeys::subscription_by_id(&lapsed.id), &lapsed).await.unwrap();
        store
            .sadd(&StoreKeys::subscriptions_by_user(&driver.id), &lapsed.id)
            .await
            .unwrap();

        assert!(svc.current(&driver.id).await.unwrap().is_none());
        let stored: Subscription = store
            .get(&StoreKeys::subscription_by_id(&lapsed.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Expired);
    }
}

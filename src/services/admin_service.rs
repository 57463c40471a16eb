// src/services/admin_service.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    errors::HaulwayResult,
    models::{
        booking::{Booking, BookingStatus},
        user::User,
    },
    services::store_service::{StoreKeys, StoreService},
    utils::geo::round_money,
};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Dashboard {
    pub users_by_role: BTreeMap<String, usize>,
    pub bookings_by_status: BTreeMap<String, usize>,
    pub online_drivers: usize,
    pub completed_revenue: f64,
    pub places: usize,
}

/// Platform-wide counters for the admin console.
pub struct AdminService {
    store: Arc<StoreService>,
}

impl AdminService {
    pub fn new(store: Arc<StoreService>) -> Self {
        Self { store }
    }

    pub async fn dashboard(&self) -> HaulwayResult<Dashboard> {
        let users: Vec<User> = self
            .store
            .load_all(&StoreKeys::all_users(), StoreKeys::user_by_id)
            .await?;
        let bookings: Vec<Booking> = self
            .store
            .load_all(&StoreKeys::all_bookings(), StoreKeys::booking_by_id)
            .await?;

        let mut dashboard = Dashboard {
            online_drivers: self.store.smembers(&StoreKeys::online_drivers()).await?.len(),
            places: self.store.smembers(&StoreKeys::all_places()).await?.len(),
            ..Default::default()
        };

        for user in &users {
            *dashboard.users_by_role.entry(label(&user.role)).or_default() += 1;
        }

        let mut revenue = 0.0;
        for booking in &bookings {
            *dashboard.bookings_by_status.entry(label(&booking.status)).or_default() += 1;
            if booking.status == BookingStatus::Completed {
                revenue += booking.fare.total;
            }
        }
        dashboard.completed_revenue = round_money(revenue);

        tracing::debug!(
            "Dashboard built from {} users and {} bookings",
            users.len(),
            bookings.len()
        );
        Ok(dashboard)
    }
}

/// The wire name of a unit enum variant, e.g. `DRIVER_ASSIGNED`.
fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "UNKNOWN".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{UserRole, UserStatus};
    use crate::utils::id_generator::{IdGenerator, IdType};
    use chrono::Utc;

    #[tokio::test]
    async fn test_dashboard_counts_users_by_role() {
        let store = Arc::new(StoreService::memory());
        let now = Utc::now();
        for role in [UserRole::Customer, UserRole::Customer, UserRole::Driver] {
            let user = User {
                id: IdGenerator::generate(IdType::User),
                role,
                status: UserStatus::Active,
                email: format!("{}@example.com", nanoid::nanoid!(6)),
                phone_number: "+233201010101".into(),
                first_name: "A".into(),
                last_name: "B".into(),
                device_tokens: vec![],
                created_at: now,
                updated_at: now,
            };
            store.put(&StoreKeys::user_by_id(&user.id), &user).await.unwrap();
            store.sadd(&StoreKeys::all_users(), &user.id).await.unwrap();
        }

        let dashboard = AdminService::new(store).dashboard().await.unwrap();
        assert_eq!(dashboard.users_by_role.get("CUSTOMER"), Some(&2));
        assert_eq!(dashboard.users_by_role.get("DRIVER"), Some(&1));
        assert_eq!(dashboard.completed_revenue, 0.0);
        assert_eq!(dashboard.online_drivers, 0);
    }
}

// src/state.rs
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::AppConfig,
    errors::HaulwayResult,
    services::{
        admin_service::AdminService,
        booking_service::BookingService,
        driver_service::DriverService,
        event_dispatcher::EventDispatcher,
        messaging_service::{FcmConfig, FcmNotificationService, MockNotificationService, NotificationService},
        order_service::OrderService,
        place_service::PlaceService,
        realtime_service::RealtimeHub,
        search_service::SearchService,
        store_service::{StoreConfig, StoreService},
        subscription_service::SubscriptionService,
        user_service::UserService,
        webhook_service::{WebhookConfig, WebhookService},
        zone_service::ZoneService,
    },
};

pub struct AppState {
    pub store: Arc<StoreService>,
    pub realtime: Arc<RealtimeHub>,
    pub user_service: Arc<UserService>,
    pub driver_service: Arc<DriverService>,
    pub booking_service: Arc<BookingService>,
    pub zone_service: Arc<ZoneService>,
    pub place_service: Arc<PlaceService>,
    pub order_service: Arc<OrderService>,
    pub search_service: Arc<SearchService>,
    pub subscription_service: Arc<SubscriptionService>,
    pub webhook_service: Arc<WebhookService>,
    pub admin_service: Arc<AdminService>,
    pub notification_service: Arc<dyn NotificationService>,
    pub config: AppConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig) -> HaulwayResult<Self> {
        let store = Arc::new(StoreService::new(&StoreConfig {
            redis_url: config.redis_url.clone(),
        })?);
        Self::with_store(config, store)
    }

    /// Wire every service around an existing store.
    pub fn with_store(config: AppConfig, store: Arc<StoreService>) -> HaulwayResult<Self> {
        let notification_service: Arc<dyn NotificationService> = match &config.fcm_server_key {
            Some(key) => Arc::new(FcmNotificationService::new(
                FcmConfig::with_server_key(key.clone()),
                Arc::clone(&store),
            )),
            None => {
                tracing::warn!("FCM_SERVER_KEY not set, using mock notification service");
                Arc::new(MockNotificationService)
            }
        };

        let realtime = Arc::new(RealtimeHub::new());
        let webhook_service = Arc::new(WebhookService::new(
            Arc::clone(&store),
            WebhookConfig {
                timeout: Duration::from_secs(config.webhook_timeout_secs),
                max_attempts: config.webhook_max_attempts,
                ..Default::default()
            },
        )?);
        let events = Arc::new(EventDispatcher::new(
            Arc::clone(&realtime),
            Arc::clone(&notification_service),
            Arc::clone(&webhook_service),
        ));

        let zone_service = Arc::new(ZoneService::new(Arc::clone(&store)));
        let subscription_service = Arc::new(SubscriptionService::new(Arc::clone(&store), config.currency.clone()));
        let user_service = Arc::new(UserService::new(Arc::clone(&store), Arc::clone(&notification_service)));
        let driver_service = Arc::new(DriverService::new(
            Arc::clone(&store),
            Arc::clone(&zone_service),
            Arc::clone(&subscription_service),
            Arc::clone(&events),
            config.require_driver_subscription,
            config.match_radius_km,
        ));
        let booking_service = Arc::new(BookingService::new(
            Arc::clone(&store),
            Arc::clone(&zone_service),
            Arc::clone(&driver_service),
            Arc::clone(&subscription_service),
            Arc::clone(&events),
            config.currency.clone(),
            config.match_radius_km,
        ));
        let place_service = Arc::new(PlaceService::new(Arc::clone(&store), Arc::clone(&zone_service)));
        let order_service = Arc::new(OrderService::new(
            Arc::clone(&store),
            Arc::clone(&place_service),
            Arc::clone(&booking_service),
            events,
            config.currency.clone(),
        ));
        let search_service = Arc::new(SearchService::new(Arc::clone(&place_service)));
        let admin_service = Arc::new(AdminService::new(Arc::clone(&store)));

        Ok(Self {
            store,
            realtime,
            user_service,
            driver_service,
            booking_service,
            zone_service,
            place_service,
            order_service,
            search_service,
            subscription_service,
            webhook_service,
            admin_service,
            notification_service,
            config,
        })
    }
}

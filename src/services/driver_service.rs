// src/services/driver_service.rs
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::{
    errors::{HaulwayError as AppError, HaulwayResult, Validator},
    models::{
        driver::{
            Availability, DriverKind, DriverLocation, DriverProfile, DriverRegistration, LocationUpdate,
            NearbyDriver, NearbyQuery,
        },
        user::{User, UserRole},
    },
    services::{
        event_dispatcher::{DomainEvent, EventDispatcher},
        realtime_service::Channels,
        store_service::{StoreKeys, StoreService},
        subscription_service::SubscriptionService,
        zone_service::ZoneService,
    },
    utils::{
        GeoPoint,
        id_generator::{IdGenerator, IdType},
    },
};

const DEFAULT_NEARBY_LIMIT: usize = 20;
const MAX_NEARBY_LIMIT: usize = 100;

#[async_trait]
pub trait DriverOperations: Send + Sync {
    async fn register_profile(&self, user: &User, registration: DriverRegistration) -> HaulwayResult<DriverProfile>;
    async fn get_driver(&self, driver_id: &str) -> HaulwayResult<DriverProfile>;
    async fn get_by_user(&self, user_id: &str) -> HaulwayResult<DriverProfile>;
    async fn set_availability(&self, user_id: &str, availability: Availability) -> HaulwayResult<DriverProfile>;
    async fn update_location(&self, user_id: &str, update: LocationUpdate) -> HaulwayResult<DriverProfile>;
    async fn find_nearby(&self, query: NearbyQuery) -> HaulwayResult<Vec<NearbyDriver>>;
    async fn verify(&self, driver_id: &str) -> HaulwayResult<DriverProfile>;
    async fn list_drivers(&self) -> HaulwayResult<Vec<DriverProfile>>;
}

pub struct DriverService {
    store: Arc<StoreService>,
    zones: Arc<ZoneService>,
    subscriptions: Arc<SubscriptionService>,
    events: Arc<EventDispatcher>,
    require_subscription: bool,
    default_radius_km: f64,
}

impl DriverService {
    pub fn new(
        store: Arc<StoreService>,
        zones: Arc<ZoneService>,
        subscriptions: Arc<SubscriptionService>,
        events: Arc<EventDispatcher>,
        require_subscription: bool,
        default_radius_km: f64,
    ) -> Self {
        Self {
            store,
            zones,
            subscriptions,
            events,
            require_subscription,
            default_radius_km,
        }
    }

    /// Persist a profile and keep the online index in step with its availability.
    pub async fn save(&self, driver: &DriverProfile) -> HaulwayResult<()> {
        self.store.put(&StoreKeys::driver_by_id(&driver.id), driver).await?;
        if driver.availability == Availability::Online {
            self.store.sadd(&StoreKeys::online_drivers(), &driver.id).await
        } else {
            self.store.srem(&StoreKeys::online_drivers(), &driver.id).await
        }
    }

    pub async fn find_by_user(&self, user_id: &str) -> HaulwayResult<Option<DriverProfile>> {
        let driver_id: Option<String> = self.store.get(&StoreKeys::driver_by_user_id(user_id)).await?;
        match driver_id {
            Some(id) => self.store.get(&StoreKeys::driver_by_id(&id)).await,
            None => Ok(None),
        }
    }

    /// Take a driver off the market for a booking.
    pub async fn occupy(&self, driver: &mut DriverProfile, booking_id: &str) -> HaulwayResult<()> {
        driver.availability = Availability::Busy;
        driver.current_booking_id = Some(booking_id.to_string());
        driver.updated_at = Utc::now();
        self.save(driver).await
    }

    /// Put a driver back online after a booking ends or is handed back.
    pub async fn free(&self, driver: &mut DriverProfile, trip_completed: bool) -> HaulwayResult<()> {
        driver.availability = Availability::Online;
        driver.current_booking_id = None;
        if trip_completed {
            driver.total_trips += 1;
        }
        driver.updated_at = Utc::now();
        self.save(driver).await
    }

    /// Dispatchable drivers of one kind, closest first.
    pub async fn nearest_available(
        &self,
        kind: DriverKind,
        point: &GeoPoint,
        radius_km: f64,
        limit: usize,
    ) -> HaulwayResult<Vec<NearbyDriver>> {
        let online: Vec<DriverProfile> = self
            .store
            .load_all(&StoreKeys::online_drivers(), StoreKeys::driver_by_id)
            .await?;

        let mut nearby: Vec<NearbyDriver> = online
            .into_iter()
            .filter(|d| d.kind == kind && d.is_dispatchable())
            .filter_map(|driver| {
                let distance_km = driver.location.as_ref()?.point.distance_km(point);
                (distance_km <= radius_km).then_some(NearbyDriver { driver, distance_km })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        nearby.truncate(limit);
        Ok(nearby)
    }
}

#[async_trait]
impl DriverOperations for DriverService {
    async fn register_profile(&self, user: &User, registration: DriverRegistration) -> HaulwayResult<DriverProfile> {
        tracing::info!("Registering {:?} driver profile for {}", registration.kind, user.id);

        if user.role != UserRole::Driver {
            return Err(AppError::InsufficientPermissions);
        }
        if self.find_by_user(&user.id).await?.is_some() {
            return Err(AppError::conflict("Driver profile already exists"));
        }

        let vehicle = &registration.vehicle;
        Validator::new()
            .require_text(&vehicle.license_plate, "vehicle.license_plate")
            .require_text(&vehicle.make, "vehicle.make")
            .require_text(&vehicle.model, "vehicle.model")
            .check(
                vehicle.capacity_kg.is_none_or(|c| c > 0.0),
                "vehicle.capacity_kg",
                "must be positive",
            )
            .finish()?;

        let now = Utc::now();
        let driver = DriverProfile {
            id: IdGenerator::generate(IdType::Driver),
            user_id: user.id.clone(),
            kind: registration.kind,
            vehicle: registration.vehicle,
            availability: Availability::Offline,
            location: None,
            zone_id: None,
            is_verified: false,
            rating: 0.0,
            rating_count: 0,
            total_trips: 0,
            current_booking_id: None,
            created_at: now,
            updated_at: now,
        };

        self.save(&driver).await?;
        self.store.put(&StoreKeys::driver_by_user_id(&user.id), &driver.id).await?;
        self.store.sadd(&StoreKeys::all_drivers(), &driver.id).await?;

        tracing::info!("Driver profile created: {}", driver.id);
        Ok(driver)
    }

    async fn get_driver(&self, driver_id: &str) -> HaulwayResult<DriverProfile> {
        if !IdGenerator::validate_id(driver_id, Some(IdType::Driver)) {
            tracing::warn!("Invalid driver ID format: {}", driver_id);
            return Err(AppError::DriverNotFound(driver_id.to_string()));
        }
        self.store
            .get(&StoreKeys::driver_by_id(driver_id))
            .await?
            .ok_or_else(|| AppError::DriverNotFound(driver_id.to_string()))
    }

    async fn get_by_user(&self, user_id: &str) -> HaulwayResult<DriverProfile> {
        self.find_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::DriverNotFound(format!("no driver profile for user {}", user_id)))
    }

    async fn set_availability(&self, user_id: &str, availability: Availability) -> HaulwayResult<DriverProfile> {
        let mut driver = self.get_by_user(user_id).await?;

        match availability {
            Availability::Busy => {
                return Err(AppError::bad_request("Busy is set by accepting a booking"));
            }
            _ if driver.current_booking_id.is_some() => {
                return Err(AppError::DriverNotAvailable(
                    "finish or release the current booking first".to_string(),
                ));
            }
            Availability::Online => {
                if !driver.is_verified {
                    return Err(AppError::forbidden("Driver profile is not verified yet"));
                }
                if driver.location.is_none() {
                    return Err(AppError::bad_request("Share a location before going online"));
                }
                if self.require_subscription && self.subscriptions.current(user_id).await?.is_none() {
                    return Err(AppError::forbidden("An active driver subscription is required"));
                }
            }
            Availability::Offline => {}
        }

        driver.availability = availability;
        driver.updated_at = Utc::now();
        self.save(&driver).await?;

        tracing::info!("Driver {} is now {:?}", driver.id, availability);
        Ok(driver)
    }

    async fn update_location(&self, user_id: &str, update: LocationUpdate) -> HaulwayResult<DriverProfile> {
        let point = GeoPoint::new(update.latitude, update.longitude);
        point.validate("location")?;
        if let Some(heading) = update.heading {
            if !(0.0..=360.0).contains(&heading) {
                return Err(AppError::validation_error("heading", "must be between 0 and 360"));
            }
        }

        let mut driver = self.get_by_user(user_id).await?;
        let zone = self.zones.detect(&point, driver.kind.serves()).await?;
        let zone_id = zone.map(|z| z.id);
        let previous_zone_id = driver.zone_id.clone();

        let now = Utc::now();
        driver.location = Some(DriverLocation {
            point,
            heading: update.heading,
            speed_kmh: update.speed_kmh,
            updated_at: now,
        });
        driver.zone_id = zone_id;
        driver.updated_at = now;
        self.save(&driver).await?;

        if driver.zone_id != previous_zone_id {
            tracing::info!(
                "Driver {} moved from zone {:?} to {:?}",
                driver.id,
                previous_zone_id,
                driver.zone_id
            );
            // Open sockets swap their zone channel on this
            self.events.publish(
                DomainEvent::new(
                    "driver.zone",
                    json!({
                        "driver_id": driver.id,
                        "zone_id": driver.zone_id,
                        "previous_zone_id": previous_zone_id,
                    }),
                )
                .on_channel(Channels::driver(&driver.id))
                .without_webhook(),
            );
        }

        if let Some(booking_id) = &driver.current_booking_id {
            let payload = json!({
                "booking_id": booking_id,
                "driver_id": driver.id,
                "latitude": point.latitude,
                "longitude": point.longitude,
                "heading": update.heading,
                "speed_kmh": update.speed_kmh,
            });
            self.events.publish(
                DomainEvent::new("driver.location", payload)
                    .on_channel(Channels::booking(booking_id))
                    .without_webhook(),
            );
        }

        tracing::debug!("Driver {} location updated", driver.id);
        Ok(driver)
    }

    async fn find_nearby(&self, query: NearbyQuery) -> HaulwayResult<Vec<NearbyDriver>> {
        let point = GeoPoint::new(query.latitude, query.longitude);
        point.validate("location")?;

        let radius_km = query.radius_km.unwrap_or(self.default_radius_km);
        if radius_km <= 0.0 {
            return Err(AppError::validation_error("radius_km", "must be positive"));
        }
        let limit = query.limit.unwrap_or(DEFAULT_NEARBY_LIMIT).clamp(1, MAX_NEARBY_LIMIT);

        tracing::debug!("Finding {:?} drivers within {} km", query.kind, radius_km);
        self.nearest_available(query.kind, &point, radius_km, limit).await
    }

    async fn verify(&self, driver_id: &str) -> HaulwayResult<DriverProfile> {
        let mut driver = self.get_driver(driver_id).await?;
        driver.is_verified = true;
        driver.updated_at = Utc::now();
        self.save(&driver).await?;
        tracing::info!("Driver {} verified", driver.id);
        Ok(driver)
    }

    async fn list_drivers(&self) -> HaulwayResult<Vec<DriverProfile>> {
        let mut drivers: Vec<DriverProfile> = self
            .store
            .load_all(&StoreKeys::all_drivers(), StoreKeys::driver_by_id)
            .await?;
        drivers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(drivers)
    }
}

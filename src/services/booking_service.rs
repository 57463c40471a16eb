// src/services/booking_service.rs
//! The booking lifecycle, shared by every booking kind.
//!
//! Status changes go through [`BookingService::transition`], which checks the
//! table on [`BookingStatus::can_transition_to`] and appends to the timeline.
//! Anything that assigns or frees a driver, or rates one, holds
//! `transition_lock`, so a booking can only ever be accepted or rated once.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    errors::{HaulwayError as AppError, HaulwayResult, Validator},
    models::{
        booking::{
            AvailableBooking, Booking, BookingDetails, BookingFilter, BookingKind, BookingQuote, BookingRating,
            BookingRequest, BookingStatus, Fare, PaymentStatus, RateRequest, StatusChange,
        },
        driver::{Availability, DriverKind, DriverProfile},
        order::OrderStatus,
        user::User,
        zone::ServiceZone,
    },
    services::{
        driver_service::{DriverOperations, DriverService},
        event_dispatcher::{DomainEvent, EventDispatcher},
        messaging_service::{customer_booking_message, driver_booking_message},
        order_service::record_delivery_outcome,
        pricing::{PricingContext, calculate_fare},
        realtime_service::Channels,
        store_service::{StoreKey, StoreKeys, StoreService},
        subscription_service::SubscriptionService,
        zone_service::ZoneService,
    },
    utils::{
        geo::eta_minutes,
        id_generator::{IdGenerator, IdType},
    },
};

const MAX_PASSENGERS: u8 = 6;
const MAX_HELPERS: u8 = 10;

#[async_trait]
pub trait BookingOperations: Send + Sync {
    async fn quote(&self, customer: &User, request: &BookingRequest) -> HaulwayResult<BookingQuote>;
    async fn create(&self, customer: &User, request: BookingRequest) -> HaulwayResult<Booking>;
    async fn get_for(&self, caller: &User, booking_id: &str) -> HaulwayResult<Booking>;
    async fn list_for_customer(&self, customer_id: &str, filter: BookingFilter) -> HaulwayResult<Vec<Booking>>;
    async fn list_for_driver(&self, driver_user: &User, filter: BookingFilter) -> HaulwayResult<Vec<Booking>>;
    async fn list_available(&self, driver_user: &User) -> HaulwayResult<Vec<AvailableBooking>>;
    async fn list_all(&self, filter: BookingFilter) -> HaulwayResult<Vec<Booking>>;
    async fn accept(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<Booking>;
    async fn release(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<Booking>;
    async fn arrive(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<Booking>;
    async fn start(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<Booking>;
    async fn complete(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<Booking>;
    async fn cancel(&self, caller: &User, booking_id: &str, reason: Option<String>) -> HaulwayResult<Booking>;
    async fn rate(&self, customer: &User, booking_id: &str, rating: RateRequest) -> HaulwayResult<Booking>;
}

pub struct BookingService {
    store: Arc<StoreService>,
    zones: Arc<ZoneService>,
    drivers: Arc<DriverService>,
    subscriptions: Arc<SubscriptionService>,
    events: Arc<EventDispatcher>,
    currency: String,
    match_radius_km: f64,
    transition_lock: Mutex<()>,
}

/// Distance, time, zone and price for a booking request, before anything is stored.
struct Estimate {
    zone: Option<ServiceZone>,
    distance_km: f64,
    eta_minutes: u32,
    quote_fare: Fare,
}

fn validate_request(request: &BookingRequest) -> HaulwayResult<()> {
    let kind = request.details.kind();
    let mut v = Validator::new();

    v.check(request.pickup.location.validate("pickup.location").is_ok(), "pickup.location", "invalid coordinates")
        .require_text(&request.pickup.address, "pickup.address");

    match &request.dropoff {
        Some(dropoff) => {
            v.check(
                dropoff.location.validate("dropoff.location").is_ok(),
                "dropoff.location",
                "invalid coordinates",
            )
            .require_text(&dropoff.address, "dropoff.address");
        }
        None => {
            v.check(!kind.requires_dropoff(), "dropoff", "is required for this booking kind");
        }
    }

    match &request.details {
        BookingDetails::Ride { passengers } | BookingDetails::Taxi { passengers } => {
            v.check(
                (1..=MAX_PASSENGERS).contains(passengers),
                "details.passengers",
                "must be between 1 and 6",
            );
        }
        BookingDetails::Delivery {
            description,
            recipient_name,
            recipient_phone,
            ..
        } => {
            v.require_text(description, "details.description")
                .require_text(recipient_name, "details.recipient_name")
                .require_text(recipient_phone, "details.recipient_phone");
        }
        BookingDetails::Moving {
            rooms,
            helpers,
            scheduled_for,
        } => {
            v.check(*rooms >= 1, "details.rooms", "must be at least 1")
                .check(*helpers <= MAX_HELPERS, "details.helpers", "at most 10 helpers")
                .check(
                    scheduled_for.is_none_or(|at| at > Utc::now()),
                    "details.scheduled_for",
                    "must be in the future",
                );
        }
        BookingDetails::Emergency { .. } => {}
    }

    v.finish()
}

fn actor(prefix: &str, id: &str) -> String {
    format!("{}:{}", prefix, id)
}

impl BookingService {
    pub fn new(
        store: Arc<StoreService>,
        zones: Arc<ZoneService>,
        drivers: Arc<DriverService>,
        subscriptions: Arc<SubscriptionService>,
        events: Arc<EventDispatcher>,
        currency: String,
        match_radius_km: f64,
    ) -> Self {
        Self {
            store,
            zones,
            drivers,
            subscriptions,
            events,
            currency,
            match_radius_km,
            transition_lock: Mutex::new(()),
        }
    }

    async fn estimate(&self, customer_id: &str, request: &BookingRequest) -> HaulwayResult<Estimate> {
        validate_request(request)?;
        let kind = request.details.kind();

        let zone = self.zones.detect(&request.pickup.location, kind).await?;
        if zone.is_none() && kind != BookingKind::Emergency {
            return Err(AppError::OutsideServiceArea);
        }

        let distance_km = request
            .dropoff
            .as_ref()
            .map(|d| request.pickup.location.distance_km(&d.location))
            .unwrap_or(0.0);
        let eta = eta_minutes(distance_km, kind.average_speed_kmh());

        let ctx = PricingContext {
            surge_multiplier: zone.as_ref().map(|z| z.surge_multiplier).unwrap_or(1.0),
            discount_percent: self.subscriptions.discount_for(customer_id).await?,
            currency: self.currency.clone(),
        };
        let quote_fare = calculate_fare(&request.details, distance_km, eta, &ctx);

        Ok(Estimate {
            zone,
            distance_km,
            eta_minutes: eta,
            quote_fare,
        })
    }

    pub async fn get(&self, booking_id: &str) -> HaulwayResult<Booking> {
        if !IdGenerator::validate_id(booking_id, Some(IdType::Booking)) {
            tracing::warn!("Invalid booking ID format: {}", booking_id);
            return Err(AppError::BookingNotFound(booking_id.to_string()));
        }
        self.store
            .get(&StoreKeys::booking_by_id(booking_id))
            .await?
            .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))
    }

    async fn save(&self, booking: &Booking) -> HaulwayResult<()> {
        self.store.put(&StoreKeys::booking_by_id(&booking.id), booking).await
    }

    /// Create a booking for a customer. `order_id` links a marketplace delivery.
    pub async fn open_booking(
        &self,
        customer_id: &str,
        request: BookingRequest,
        order_id: Option<String>,
    ) -> HaulwayResult<Booking> {
        let estimate = self.estimate(customer_id, &request).await?;
        let kind = request.details.kind();
        let now = Utc::now();

        let booking = Booking {
            id: IdGenerator::generate(IdType::Booking),
            kind,
            customer_id: customer_id.to_string(),
            driver_id: None,
            status: BookingStatus::Pending,
            pickup: request.pickup,
            dropoff: request.dropoff,
            details: request.details,
            zone_id: estimate.zone.map(|z| z.id),
            distance_km: estimate.distance_km,
            eta_minutes: estimate.eta_minutes,
            fare: estimate.quote_fare,
            payment_status: PaymentStatus::Pending,
            order_id,
            notes: request.notes,
            timeline: vec![StatusChange {
                from: None,
                to: BookingStatus::Pending,
                actor: actor("customer", customer_id),
                at: now,
                note: None,
            }],
            rating: None,
            cancellation_reason: None,
            created_at: now,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            updated_at: now,
        };

        self.save(&booking).await?;
        self.store.sadd(&StoreKeys::all_bookings(), &booking.id).await?;
        self.store.sadd(&StoreKeys::pending_bookings(), &booking.id).await?;
        self.store
            .sadd(&StoreKeys::bookings_by_customer(customer_id), &booking.id)
            .await?;

        tracing::info!(
            "{:?} booking {} created for {} - {:.2} {}",
            booking.kind,
            booking.id,
            customer_id,
            booking.fare.total,
            booking.fare.currency
        );

        let payload = serde_json::to_value(&booking)?;
        self.events.publish(
            DomainEvent::new("booking.created", payload)
                .on_channel(Channels::user(&booking.customer_id))
                .on_channel(Channels::booking(&booking.id))
                .on_channel(self.dispatch_channel(&booking)),
        );

        if booking.kind == BookingKind::Emergency {
            return self.auto_dispatch(booking).await;
        }
        Ok(booking)
    }

    /// Where drivers hear about a pending booking.
    fn dispatch_channel(&self, booking: &Booking) -> String {
        match &booking.zone_id {
            Some(zone_id) => Channels::zone(zone_id),
            None => Channels::emergency(),
        }
    }

    /// Hand an emergency to the nearest free responder allowed in its zone.
    async fn auto_dispatch(&self, mut booking: Booking) -> HaulwayResult<Booking> {
        let _guard = self.transition_lock.lock().await;

        // Every responder in range, nearest first; the zone check must see all of them
        let candidates = self
            .drivers
            .nearest_available(
                DriverKind::EmergencyResponder,
                &booking.pickup.location,
                self.match_radius_km,
                usize::MAX,
            )
            .await?;

        let chosen = candidates.into_iter().find(|candidate| match &booking.zone_id {
            Some(zone_id) => candidate.driver.zone_id.as_ref() == Some(zone_id),
            None => true,
        });

        let Some(candidate) = chosen else {
            tracing::warn!("No responder available for emergency {}, left pending", booking.id);
            return Ok(booking);
        };

        let mut driver = candidate.driver;
        tracing::info!(
            "Emergency {} dispatched to {} ({:.2} km away)",
            booking.id,
            driver.id,
            candidate.distance_km
        );
        self.assign(&mut booking, &mut driver, "system".to_string()).await?;
        self.announce(&booking, Some(&driver.user_id));
        Ok(booking)
    }

    /// Price a finished trip. Time is billed on the longer of the estimate and
    /// the measured ride; distance and surge stay as quoted.
    async fn final_fare(&self, booking: &Booking) -> HaulwayResult<Fare> {
        let ridden = booking
            .started_at
            .map(|at| (Utc::now() - at).num_minutes().max(0) as u32)
            .unwrap_or(0);
        let ctx = PricingContext {
            surge_multiplier: booking.fare.surge_multiplier,
            discount_percent: self.subscriptions.discount_for(&booking.customer_id).await?,
            currency: booking.fare.currency.clone(),
        };
        Ok(calculate_fare(
            &booking.details,
            booking.distance_km,
            booking.eta_minutes.max(ridden),
            &ctx,
        ))
    }

    fn transition(
        booking: &mut Booking,
        to: BookingStatus,
        actor: String,
        note: Option<String>,
    ) -> HaulwayResult<()> {
        if !booking.status.can_transition_to(to) {
            return Err(AppError::invalid_transition(booking.status, to));
        }

        let now = Utc::now();
        booking.timeline.push(StatusChange {
            from: Some(booking.status),
            to,
            actor,
            at: now,
            note,
        });
        booking.status = to;
        booking.updated_at = now;

        match to {
            BookingStatus::Pending => booking.accepted_at = None,
            BookingStatus::DriverAssigned => booking.accepted_at = Some(now),
            BookingStatus::DriverArrived => {}
            BookingStatus::InProgress => booking.started_at = Some(now),
            BookingStatus::Completed => booking.completed_at = Some(now),
            BookingStatus::Cancelled => booking.cancelled_at = Some(now),
        }
        Ok(())
    }

    async fn assign(&self, booking: &mut Booking, driver: &mut DriverProfile, actor: String) -> HaulwayResult<()> {
        Self::transition(booking, BookingStatus::DriverAssigned, actor, None)?;
        booking.driver_id = Some(driver.id.clone());

        self.save(booking).await?;
        self.store.srem(&StoreKeys::pending_bookings(), &booking.id).await?;
        self.store
            .sadd(&StoreKeys::bookings_by_driver(&driver.id), &booking.id)
            .await?;
        self.drivers.occupy(driver, &booking.id).await
    }

    /// Publish the booking's current status to every party.
    fn announce(&self, booking: &Booking, driver_user_id: Option<&str>) {
        let payload = match serde_json::to_value(booking) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Could not serialize booking {} for fan-out: {}", booking.id, e);
                return;
            }
        };

        let mut event = DomainEvent::new(format!("booking.{}", booking.status.event_suffix()), payload)
            .on_channel(Channels::booking(&booking.id))
            .on_channel(Channels::user(&booking.customer_id))
            .push_to(&booking.customer_id, customer_booking_message(booking));

        if let Some(driver_id) = &booking.driver_id {
            event = event.on_channel(Channels::driver(driver_id));
        }
        if let Some(user_id) = driver_user_id {
            event = event.push_to(user_id, driver_booking_message(booking));
        }
        if booking.status == BookingStatus::Pending {
            event = event.on_channel(self.dispatch_channel(booking));
        }

        self.events.publish(event);
    }

    /// The caller's driver profile, plus the booking if they are its assigned driver.
    async fn assigned_pair(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<(DriverProfile, Booking)> {
        let driver = self.drivers.get_by_user(&driver_user.id).await?;
        let booking = self.get(booking_id).await?;
        if booking.driver_id.as_deref() != Some(driver.id.as_str()) {
            return Err(AppError::forbidden("Only the assigned driver can do this"));
        }
        Ok((driver, booking))
    }

    async fn driver_step(&self, driver_user: &User, booking_id: &str, to: BookingStatus) -> HaulwayResult<Booking> {
        let _guard = self.transition_lock.lock().await;
        let (driver, mut booking) = self.assigned_pair(driver_user, booking_id).await?;

        Self::transition(&mut booking, to, actor("driver", &driver.id), None)?;
        self.save(&booking).await?;

        tracing::info!("Booking {} is now {:?}", booking.id, to);
        self.announce(&booking, None);
        Ok(booking)
    }

    async fn load_index(&self, index: &StoreKey, filter: &BookingFilter) -> HaulwayResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self.store.load_all(index, StoreKeys::booking_by_id).await?;
        bookings.retain(|b| {
            filter.status.is_none_or(|status| b.status == status) && filter.kind.is_none_or(|kind| b.kind == kind)
        });
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }
}

#[async_trait]
impl BookingOperations for BookingService {
    async fn quote(&self, customer: &User, request: &BookingRequest) -> HaulwayResult<BookingQuote> {
        tracing::debug!("Quoting {:?} booking for {}", request.details.kind(), customer.id);
        let estimate = self.estimate(&customer.id, request).await?;
        Ok(BookingQuote {
            kind: request.details.kind(),
            zone_id: estimate.zone.map(|z| z.id),
            distance_km: estimate.distance_km,
            eta_minutes: estimate.eta_minutes,
            fare: estimate.quote_fare,
        })
    }

    async fn create(&self, customer: &User, request: BookingRequest) -> HaulwayResult<Booking> {
        if !customer.role.can_book() {
            return Err(AppError::InsufficientPermissions);
        }
        tracing::info!("Creating {:?} booking for {}", request.details.kind(), customer.id);
        self.open_booking(&customer.id, request, None).await
    }

    async fn get_for(&self, caller: &User, booking_id: &str) -> HaulwayResult<Booking> {
        let booking = self.get(booking_id).await?;
        if caller.is_admin() || booking.customer_id == caller.id {
            return Ok(booking);
        }

        let driver_id = self.drivers.find_by_user(&caller.id).await?.map(|d| d.id);
        if booking.involves_user(&caller.id, driver_id.as_deref()) {
            Ok(booking)
        } else {
            Err(AppError::BookingNotFound(booking_id.to_string()))
        }
    }

    async fn list_for_customer(&self, customer_id: &str, filter: BookingFilter) -> HaulwayResult<Vec<Booking>> {
        tracing::debug!("Getting bookings for customer: {}", customer_id);
        self.load_index(&StoreKeys::bookings_by_customer(customer_id), &filter).await
    }

    async fn list_for_driver(&self, driver_user: &User, filter: BookingFilter) -> HaulwayResult<Vec<Booking>> {
        let driver = self.drivers.get_by_user(&driver_user.id).await?;
        tracing::debug!("Getting bookings for driver: {}", driver.id);
        self.load_index(&StoreKeys::bookings_by_driver(&driver.id), &filter).await
    }

    async fn list_available(&self, driver_user: &User) -> HaulwayResult<Vec<AvailableBooking>> {
        let driver = self.drivers.get_by_user(&driver_user.id).await?;
        let location = driver
            .location
            .as_ref()
            .ok_or_else(|| AppError::bad_request("Share a location to see nearby bookings"))?;
        let serves = driver.kind.serves();

        let pending: Vec<Booking> = self
            .store
            .load_all(&StoreKeys::pending_bookings(), StoreKeys::booking_by_id)
            .await?;

        let mut available: Vec<AvailableBooking> = pending
            .into_iter()
            .filter(|b| b.status == BookingStatus::Pending && b.kind == serves)
            .filter(|b| match &b.zone_id {
                Some(zone_id) => driver.zone_id.as_ref() == Some(zone_id),
                None => b.kind == BookingKind::Emergency,
            })
            .filter_map(|booking| {
                let distance = location.point.distance_km(&booking.pickup.location);
                (distance <= self.match_radius_km).then(|| AvailableBooking {
                    minutes_to_pickup: eta_minutes(distance, serves.average_speed_kmh()),
                    distance_to_pickup_km: distance,
                    booking,
                })
            })
            .collect();

        available.sort_by(|a, b| a.distance_to_pickup_km.total_cmp(&b.distance_to_pickup_km));
        tracing::debug!("{} bookings available to driver {}", available.len(), driver.id);
        Ok(available)
    }

    async fn list_all(&self, filter: BookingFilter) -> HaulwayResult<Vec<Booking>> {
        self.load_index(&StoreKeys::all_bookings(), &filter).await
    }

    async fn accept(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<Booking> {
        let _guard = self.transition_lock.lock().await;

        let mut driver = self.drivers.get_by_user(&driver_user.id).await?;
        let mut booking = self.get(booking_id).await?;
        tracing::info!("Driver {} accepting booking {}", driver.id, booking.id);

        if !driver.is_verified {
            return Err(AppError::forbidden("Driver profile is not verified yet"));
        }
        if driver.availability != Availability::Online || driver.current_booking_id.is_some() {
            return Err(AppError::DriverNotAvailable(format!("driver is {:?}", driver.availability)));
        }
        if booking.kind.driver_kind() != driver.kind {
            return Err(AppError::forbidden(format!(
                "{:?} drivers cannot take {:?} bookings",
                driver.kind, booking.kind
            )));
        }
        if booking.status != BookingStatus::Pending {
            return Err(match booking.driver_id {
                Some(_) => AppError::BookingAlreadyAssigned,
                None => AppError::invalid_transition(booking.status, BookingStatus::DriverAssigned),
            });
        }
        if let Some(zone_id) = &booking.zone_id {
            if driver.zone_id.as_ref() != Some(zone_id) {
                tracing::warn!(
                    "Driver {} in zone {:?} tried to accept booking {} in zone {}",
                    driver.id,
                    driver.zone_id,
                    booking.id,
                    zone_id
                );
                return Err(AppError::ZoneMismatch);
            }
        }

        let by = actor("driver", &driver.id);
        self.assign(&mut booking, &mut driver, by).await?;

        tracing::info!("Driver {} assigned to booking {}", driver.id, booking.id);
        self.announce(&booking, None);
        Ok(booking)
    }

    async fn release(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<Booking> {
        let _guard = self.transition_lock.lock().await;
        let (mut driver, mut booking) = self.assigned_pair(driver_user, booking_id).await?;

        Self::transition(
            &mut booking,
            BookingStatus::Pending,
            actor("driver", &driver.id),
            Some("released by driver".to_string()),
        )?;
        booking.driver_id = None;

        self.save(&booking).await?;
        self.store.sadd(&StoreKeys::pending_bookings(), &booking.id).await?;
        self.store
            .srem(&StoreKeys::bookings_by_driver(&driver.id), &booking.id)
            .await?;
        self.drivers.free(&mut driver, false).await?;

        tracing::info!("Driver {} released booking {}", driver.id, booking.id);
        self.announce(&booking, None);
        Ok(booking)
    }

    async fn arrive(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<Booking> {
        self.driver_step(driver_user, booking_id, BookingStatus::DriverArrived).await
    }

    async fn start(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<Booking> {
        self.driver_step(driver_user, booking_id, BookingStatus::InProgress).await
    }

    async fn complete(&self, driver_user: &User, booking_id: &str) -> HaulwayResult<Booking> {
        let _guard = self.transition_lock.lock().await;
        let (mut driver, mut booking) = self.assigned_pair(driver_user, booking_id).await?;

        Self::transition(&mut booking, BookingStatus::Completed, actor("driver", &driver.id), None)?;
        booking.fare = self.final_fare(&booking).await?;
        booking.payment_status = PaymentStatus::Captured;

        self.save(&booking).await?;
        self.drivers.free(&mut driver, true).await?;

        if let Some(order_id) = &booking.order_id {
            if let Err(e) = record_delivery_outcome(&self.store, &self.events, order_id, OrderStatus::Delivered).await {
                tracing::warn!("Order {} not updated after delivery {}: {}", order_id, booking.id, e);
            }
        }

        tracing::info!(
            "Booking {} completed - {:.2} {}",
            booking.id,
            booking.fare.total,
            booking.fare.currency
        );
        self.announce(&booking, None);
        Ok(booking)
    }

    async fn cancel(&self, caller: &User, booking_id: &str, reason: Option<String>) -> HaulwayResult<Booking> {
        let _guard = self.transition_lock.lock().await;
        let mut booking = self.get(booking_id).await?;

        let caller_driver = self.drivers.find_by_user(&caller.id).await?;
        let is_assigned_driver = matches!(
            (&caller_driver, &booking.driver_id),
            (Some(d), Some(assigned)) if &d.id == assigned
        );

        let by = if caller.is_admin() {
            actor("admin", &caller.id)
        } else if booking.customer_id == caller.id {
            if booking.status == BookingStatus::InProgress {
                return Err(AppError::invalid_transition(booking.status, BookingStatus::Cancelled));
            }
            actor("customer", &caller.id)
        } else if is_assigned_driver {
            if booking.status != BookingStatus::DriverArrived {
                return Err(AppError::bad_request(
                    "Drivers cancel only after arriving; release the booking instead",
                ));
            }
            actor("driver", &booking.driver_id.clone().unwrap_or_default())
        } else {
            return Err(AppError::BookingNotFound(booking_id.to_string()));
        };

        Self::transition(&mut booking, BookingStatus::Cancelled, by, reason.clone())?;
        booking.cancellation_reason = reason;
        booking.payment_status = PaymentStatus::Voided;

        self.save(&booking).await?;
        self.store.srem(&StoreKeys::pending_bookings(), &booking.id).await?;

        let mut driver_user_id = None;
        if let Some(driver_id) = &booking.driver_id {
            let mut driver = self.drivers.get_driver(driver_id).await?;
            if driver.current_booking_id.as_deref() == Some(booking.id.as_str()) {
                self.drivers.free(&mut driver, false).await?;
            }
            if !is_assigned_driver {
                driver_user_id = Some(driver.user_id);
            }
        }

        if let Some(order_id) = &booking.order_id {
            if let Err(e) =
                record_delivery_outcome(&self.store, &self.events, order_id, OrderStatus::ReadyForPickup).await
            {
                tracing::warn!("Order {} not reset after cancellation of {}: {}", order_id, booking.id, e);
            }
        }

        tracing::info!("Booking {} cancelled", booking.id);
        self.announce(&booking, driver_user_id.as_deref());
        Ok(booking)
    }

    async fn rate(&self, customer: &User, booking_id: &str, rating: RateRequest) -> HaulwayResult<Booking> {
        let _guard = self.transition_lock.lock().await;

        let mut booking = self.get(booking_id).await?;
        if booking.customer_id != customer.id {
            return Err(AppError::BookingNotFound(booking_id.to_string()));
        }
        if booking.status != BookingStatus::Completed {
            return Err(AppError::bad_request("Only completed bookings can be rated"));
        }
        if booking.rating.is_some() {
            return Err(AppError::conflict("Booking already rated"));
        }
        Validator::new()
            .check((1..=5).contains(&rating.score), "score", "must be between 1 and 5")
            .finish()?;

        let driver_id = booking
            .driver_id
            .clone()
            .ok_or_else(|| AppError::internal_error("completed booking has no driver"))?;

        let mut driver = self.drivers.get_driver(&driver_id).await?;
        driver.record_rating(rating.score);
        self.drivers.save(&driver).await?;

        booking.rating = Some(BookingRating {
            score: rating.score,
            comment: rating.comment,
            rated_at: Utc::now(),
        });
        booking.updated_at = Utc::now();
        self.save(&booking).await?;

        tracing::info!("Booking {} rated {} by {}", booking.id, rating.score, customer.id);
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        booking::{EmergencyCategory, PackageSize, Stop},
        driver::{DriverRegistration, LocationUpdate, Vehicle, VehicleType},
        user::{UserRole, UserStatus},
        zone::{ZoneBoundary, ZoneCreate},
    };
    use crate::services::{
        messaging_service::MockNotificationService,
        realtime_service::RealtimeHub,
        webhook_service::{WebhookConfig, WebhookService},
    };
    use crate::utils::GeoPoint;

    const ACCRA: (f64, f64) = (5.6037, -0.1870);
    const KUMASI: (f64, f64) = (6.6885, -1.6244);

    struct Fixture {
        bookings: BookingService,
        drivers: Arc<DriverService>,
        zones: Arc<ZoneService>,
        hub: Arc<RealtimeHub>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(StoreService::memory());
        let hub = Arc::new(RealtimeHub::new());
        let events = Arc::new(EventDispatcher::new(
            Arc::clone(&hub),
            Arc::new(MockNotificationService),
            Arc::new(WebhookService::new(Arc::clone(&store), WebhookConfig::default()).unwrap()),
        ));
        let zones = Arc::new(ZoneService::new(Arc::clone(&store)));
        let subscriptions = Arc::new(SubscriptionService::new(Arc::clone(&store), "GHS".into()));
        let drivers = Arc::new(DriverService::new(
            Arc::clone(&store),
            Arc::clone(&zones),
            Arc::clone(&subscriptions),
            Arc::clone(&events),
            false,
            10.0,
        ));
        let bookings = BookingService::new(
            store,
            Arc::clone(&zones),
            Arc::clone(&drivers),
            subscriptions,
            events,
            "GHS".into(),
            10.0,
        );
        Fixture {
            bookings,
            drivers,
            zones,
            hub,
        }
    }

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: IdGenerator::generate(IdType::User),
            role,
            status: UserStatus::Active,
            email: format!("{:?}@example.com", role).to_lowercase(),
            phone_number: "+233206666666".into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            device_tokens: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn stop(point: (f64, f64), address: &str) -> Stop {
        Stop {
            location: GeoPoint::new(point.0, point.1),
            address: address.into(),
            contact_phone: None,
            instructions: None,
        }
    }

    fn ride_request() -> BookingRequest {
        BookingRequest {
            pickup: stop(ACCRA, "Accra Mall"),
            dropoff: Some(stop((5.65, -0.18), "Legon")),
            details: BookingDetails::Ride { passengers: 1 },
            notes: None,
        }
    }

    async fn accra_zone(f: &Fixture, name: &str) -> ServiceZone {
        f.zones
            .create(ZoneCreate {
                name: name.into(),
                boundary: ZoneBoundary::Circle {
                    center: GeoPoint::new(ACCRA.0, ACCRA.1),
                    radius_km: 25.0,
                },
                surge_multiplier: Some(1.0),
                supported_kinds: vec![],
            })
            .await
            .unwrap()
    }

    async fn online_driver(f: &Fixture, kind: DriverKind, at: (f64, f64)) -> (User, DriverProfile) {
        let account = user(UserRole::Driver);
        let profile = f
            .drivers
            .register_profile(
                &account,
                DriverRegistration {
                    kind,
                    vehicle: Vehicle {
                        license_plate: "GT-1000-24".into(),
                        vehicle_type: VehicleType::Car,
                        make: "Toyota".into(),
                        model: "Vitz".into(),
                        color: "Blue".into(),
                        capacity_kg: None,
                    },
                },
            )
            .await
            .unwrap();
        f.drivers.verify(&profile.id).await.unwrap();
        f.drivers
            .update_location(
                &account.id,
                LocationUpdate {
                    latitude: at.0,
                    longitude: at.1,
                    heading: None,
                    speed_kmh: None,
                },
            )
            .await
            .unwrap();
        let profile = f.drivers.set_availability(&account.id, Availability::Online).await.unwrap();
        (account, profile)
    }

    #[tokio::test]
    async fn test_full_ride_lifecycle() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);
        let (driver_user, driver) = online_driver(&f, DriverKind::Ride, (5.605, -0.188)).await;

        let booking = f.bookings.create(&customer, ride_request()).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.zone_id.is_some());

        let available = f.bookings.list_available(&driver_user).await.unwrap();
        assert_eq!(available.len(), 1);

        let accepted = f.bookings.accept(&driver_user, &booking.id).await.unwrap();
        assert_eq!(accepted.driver_id.as_deref(), Some(driver.id.as_str()));
        assert_eq!(
            f.drivers.get_driver(&driver.id).await.unwrap().availability,
            Availability::Busy
        );

        f.bookings.arrive(&driver_user, &booking.id).await.unwrap();
        f.bookings.start(&driver_user, &booking.id).await.unwrap();
        let done = f.bookings.complete(&driver_user, &booking.id).await.unwrap();

        assert_eq!(done.status, BookingStatus::Completed);
        assert_eq!(done.payment_status, PaymentStatus::Captured);
        assert_eq!(done.timeline.len(), 5);

        let freed = f.drivers.get_driver(&driver.id).await.unwrap();
        assert_eq!(freed.availability, Availability::Online);
        assert_eq!(freed.total_trips, 1);

        let rated = f
            .bookings
            .rate(&customer, &booking.id, RateRequest { score: 4, comment: None })
            .await
            .unwrap();
        assert_eq!(rated.rating.map(|r| r.score), Some(4));
        assert!(f
            .bookings
            .rate(&customer, &booking.id, RateRequest { score: 5, comment: None })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_outside_every_zone_is_refused() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);

        let mut request = ride_request();
        request.pickup = stop(KUMASI, "Kejetia");
        assert!(matches!(
            f.bookings.create(&customer, request).await,
            Err(AppError::OutsideServiceArea)
        ));
    }

    #[tokio::test]
    async fn test_second_accept_is_rejected() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);
        let (first, _) = online_driver(&f, DriverKind::Ride, (5.605, -0.188)).await;
        let (second, _) = online_driver(&f, DriverKind::Ride, (5.606, -0.189)).await;

        let booking = f.bookings.create(&customer, ride_request()).await.unwrap();
        f.bookings.accept(&first, &booking.id).await.unwrap();

        assert!(matches!(
            f.bookings.accept(&second, &booking.id).await,
            Err(AppError::BookingAlreadyAssigned)
        ));
    }

    #[tokio::test]
    async fn test_zone_mismatch_and_wrong_kind() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);
        let booking = f.bookings.create(&customer, ride_request()).await.unwrap();

        // Online in no zone at all
        let (outsider, _) = online_driver(&f, DriverKind::Ride, KUMASI).await;
        assert!(matches!(
            f.bookings.accept(&outsider, &booking.id).await,
            Err(AppError::ZoneMismatch)
        ));

        let (taxi, _) = online_driver(&f, DriverKind::Taxi, (5.605, -0.188)).await;
        assert!(matches!(
            f.bookings.accept(&taxi, &booking.id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_release_returns_booking_to_pool() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);
        let (driver_user, driver) = online_driver(&f, DriverKind::Ride, (5.605, -0.188)).await;

        let booking = f.bookings.create(&customer, ride_request()).await.unwrap();
        f.bookings.accept(&driver_user, &booking.id).await.unwrap();

        // Cannot skip ahead
        assert!(matches!(
            f.bookings.complete(&driver_user, &booking.id).await,
            Err(AppError::InvalidTransition { .. })
        ));

        let released = f.bookings.release(&driver_user, &booking.id).await.unwrap();
        assert_eq!(released.status, BookingStatus::Pending);
        assert!(released.driver_id.is_none());
        assert!(released.accepted_at.is_none());
        assert_eq!(
            f.drivers.get_driver(&driver.id).await.unwrap().availability,
            Availability::Online
        );
        assert_eq!(f.bookings.list_available(&driver_user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);
        let stranger = user(UserRole::Customer);
        let (driver_user, driver) = online_driver(&f, DriverKind::Ride, (5.605, -0.188)).await;

        let booking = f.bookings.create(&customer, ride_request()).await.unwrap();
        assert!(f.bookings.cancel(&stranger, &booking.id, None).await.is_err());

        f.bookings.accept(&driver_user, &booking.id).await.unwrap();
        assert!(f.bookings.cancel(&driver_user, &booking.id, None).await.is_err());

        let cancelled = f
            .bookings
            .cancel(&customer, &booking.id, Some("changed plans".into()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Voided);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("changed plans"));
        assert_eq!(
            f.drivers.get_driver(&driver.id).await.unwrap().availability,
            Availability::Online
        );

        assert!(matches!(
            f.bookings.cancel(&customer, &booking.id, None).await,
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_emergency_outside_zones_is_auto_dispatched() {
        let f = fixture();
        let mut rx = f.hub.subscribe();
        let customer = user(UserRole::Customer);
        let (_far, _) = online_driver(&f, DriverKind::EmergencyResponder, (6.70, -1.63)).await;
        let (_near, near) = online_driver(&f, DriverKind::EmergencyResponder, (6.689, -1.625)).await;

        let booking = f
            .bookings
            .create(
                &customer,
                BookingRequest {
                    pickup: stop(KUMASI, "Adum"),
                    dropoff: None,
                    details: BookingDetails::Emergency {
                        category: EmergencyCategory::Medical,
                        notes: Some("Chest pain".into()),
                    },
                    notes: None,
                },
            )
            .await
            .unwrap();

        assert!(booking.zone_id.is_none());
        assert_eq!(booking.status, BookingStatus::DriverAssigned);
        assert_eq!(booking.driver_id.as_deref(), Some(near.id.as_str()));
        assert_eq!(booking.fare.total, 55.0);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, "booking.created");
    }

    #[tokio::test]
    async fn test_delivery_details_are_validated() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);

        let request = BookingRequest {
            pickup: stop(ACCRA, "Osu"),
            dropoff: None,
            details: BookingDetails::Delivery {
                package_size: PackageSize::Small,
                description: "".into(),
                recipient_name: "Efua".into(),
                recipient_phone: "+233240000000".into(),
            },
            notes: None,
        };

        match f.bookings.quote(&customer, &request).await {
            Err(AppError::ValidationFailed(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["dropoff", "details.description"]);
            }
            other => panic!("expected validation failure, got {:?}", other.map(|q| q.fare.total)),
        }
    }

    #[tokio::test]
    async fn test_drivers_cannot_book() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let driver = user(UserRole::Driver);
        assert!(matches!(
            f.bookings.create(&driver, ride_request()).await,
            Err(AppError::InsufficientPermissions)
        ));
    }

    async fn completed_ride(f: &Fixture, customer: &User) -> (Booking, DriverProfile) {
        let (driver_user, driver) = online_driver(f, DriverKind::Ride, (5.605, -0.188)).await;
        let booking = f.bookings.create(customer, ride_request()).await.unwrap();
        f.bookings.accept(&driver_user, &booking.id).await.unwrap();
        f.bookings.arrive(&driver_user, &booking.id).await.unwrap();
        f.bookings.start(&driver_user, &booking.id).await.unwrap();
        let done = f.bookings.complete(&driver_user, &booking.id).await.unwrap();
        (done, driver)
    }

    #[tokio::test]
    async fn test_concurrent_ratings_count_once() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);
        let (booking, driver) = completed_ride(&f, &customer).await;

        // Both calls queue behind the lock before either can run
        let held = f.bookings.transition_lock.lock().await;
        let release = async move {
            tokio::task::yield_now().await;
            drop(held);
        };
        let (first, second, ()) = tokio::join!(
            f.bookings.rate(&customer, &booking.id, RateRequest { score: 5, comment: None }),
            f.bookings.rate(&customer, &booking.id, RateRequest { score: 1, comment: None }),
            release,
        );

        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(first.err().or(second.err()), Some(AppError::Conflict(_))));

        let rated = f.drivers.get_driver(&driver.id).await.unwrap();
        assert_eq!(rated.rating_count, 1);
        assert!(rated.rating == 5.0 || rated.rating == 1.0);
    }

    #[tokio::test]
    async fn test_concurrent_accepts_assign_one_driver() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);
        let (first, first_profile) = online_driver(&f, DriverKind::Ride, (5.605, -0.188)).await;
        let (second, second_profile) = online_driver(&f, DriverKind::Ride, (5.606, -0.189)).await;
        let booking = f.bookings.create(&customer, ride_request()).await.unwrap();

        let held = f.bookings.transition_lock.lock().await;
        let release = async move {
            tokio::task::yield_now().await;
            drop(held);
        };
        let (a, b, ()) = tokio::join!(
            f.bookings.accept(&first, &booking.id),
            f.bookings.accept(&second, &booking.id),
            release,
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(a.err().or(b.err()), Some(AppError::BookingAlreadyAssigned)));

        let mut busy = 0;
        for id in [&first_profile.id, &second_profile.id] {
            if f.drivers.get_driver(id).await.unwrap().availability == Availability::Busy {
                busy += 1;
            }
        }
        assert_eq!(busy, 1);
    }

    #[tokio::test]
    async fn test_emergency_skips_closer_responders_across_the_zone_line() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);

        // Just beyond the 25 km boundary, closer to the pickup than anyone inside
        for i in 0..6 {
            online_driver(&f, DriverKind::EmergencyResponder, (5.835, -0.187 + i as f64 * 0.001)).await;
        }
        let (_inside, inside) = online_driver(&f, DriverKind::EmergencyResponder, (5.78, -0.187)).await;
        assert!(inside.zone_id.is_some());

        let booking = f
            .bookings
            .create(
                &customer,
                BookingRequest {
                    pickup: stop((5.8187, -0.187), "Amasaman"),
                    dropoff: None,
                    details: BookingDetails::Emergency {
                        category: EmergencyCategory::Fire,
                        notes: None,
                    },
                    notes: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(booking.zone_id, inside.zone_id);
        assert_eq!(booking.status, BookingStatus::DriverAssigned);
        assert_eq!(booking.driver_id.as_deref(), Some(inside.id.as_str()));
    }

    #[tokio::test]
    async fn test_completion_bills_a_long_ride_by_the_clock() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);
        let (driver_user, _) = online_driver(&f, DriverKind::Ride, (5.605, -0.188)).await;

        let booking = f.bookings.create(&customer, ride_request()).await.unwrap();
        f.bookings.accept(&driver_user, &booking.id).await.unwrap();
        f.bookings.arrive(&driver_user, &booking.id).await.unwrap();
        let mut started = f.bookings.start(&driver_user, &booking.id).await.unwrap();

        started.started_at = Some(Utc::now() - chrono::Duration::minutes(90));
        f.bookings.save(&started).await.unwrap();

        let done = f.bookings.complete(&driver_user, &booking.id).await.unwrap();
        assert_eq!(done.fare.time_fare, 22.5);
        assert!(done.fare.total > booking.fare.total);
    }

    #[tokio::test]
    async fn test_completion_keeps_quote_for_a_quick_ride() {
        let f = fixture();
        accra_zone(&f, "Accra").await;
        let customer = user(UserRole::Customer);
        let quoted = f.bookings.quote(&customer, &ride_request()).await.unwrap();

        let (done, _) = completed_ride(&f, &customer).await;
        assert_eq!(done.fare, quoted.fare);
    }
}

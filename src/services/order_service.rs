// src/services/order_service.rs
use chrono::Utc;
use std::sync::Arc;

use crate::{
    errors::{HaulwayError as AppError, HaulwayResult, Validator},
    models::{
        booking::{BookingDetails, BookingRequest, PackageSize, Stop},
        order::{Order, OrderLine, OrderRequest, OrderStatus},
        place::Place,
        user::{User, UserRole},
    },
    services::{
        booking_service::{BookingOperations, BookingService},
        event_dispatcher::{DomainEvent, EventDispatcher},
        messaging_service::NotificationMessage,
        place_service::PlaceService,
        realtime_service::Channels,
        store_service::{StoreKeys, StoreService},
    },
    utils::{
        geo::round_money,
        id_generator::{IdGenerator, IdType},
    },
};

const MAX_LINE_QUANTITY: u32 = 50;

fn order_message(order: &Order) -> Option<NotificationMessage> {
    let body = match order.status {
        OrderStatus::Accepted => "Your order was accepted",
        OrderStatus::Rejected => "Your order was declined",
        OrderStatus::OutForDelivery => "Your order is on its way",
        OrderStatus::Delivered => "Your order was delivered",
        _ => return None,
    };
    Some(
        NotificationMessage::new("Order update", body)
            .with_data(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
}

/// Announce an order change to its customer and the place owner.
fn announce(events: &EventDispatcher, order: &Order, owner_id: Option<&str>) {
    let payload = match serde_json::to_value(order) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("Failed to serialize order {}: {}", order.id, e);
            return;
        }
    };

    let mut event = DomainEvent::new(format!("order.{}", order.status.event_suffix()), payload)
        .on_channel(Channels::user(&order.customer_id))
        .push_to(order.customer_id.clone(), order_message(order));
    if let Some(owner_id) = owner_id {
        event = event.on_channel(Channels::user(owner_id));
        if order.status == OrderStatus::Placed {
            event = event.push_to(
                owner_id,
                Some(NotificationMessage::new("New order", &format!("Order {} is waiting", order.id))),
            );
        }
    }
    events.publish(event);
}

fn move_to(order: &mut Order, next: OrderStatus) -> HaulwayResult<()> {
    if !order.status.can_transition_to(next) {
        return Err(AppError::bad_request(format!(
            "Order cannot move from {:?} to {:?}",
            order.status, next
        )));
    }
    order.status = next;
    order.updated_at = Utc::now();
    Ok(())
}

/// Reflect the fate of an order's delivery booking. Called by the booking
/// lifecycle when the courier completes or the delivery is cancelled.
pub async fn record_delivery_outcome(
    store: &StoreService,
    events: &EventDispatcher,
    order_id: &str,
    status: OrderStatus,
) -> HaulwayResult<()> {
    let mut order: Order = store
        .get(&StoreKeys::order_by_id(order_id))
        .await?
        .ok_or_else(|| AppError::OrderNotFound(order_id.to_string()))?;

    move_to(&mut order, status)?;
    if status == OrderStatus::ReadyForPickup {
        order.delivery_booking_id = None;
    }
    store.put(&StoreKeys::order_by_id(&order.id), &order).await?;

    let owner_id = store
        .get::<Place>(&StoreKeys::place_by_id(&order.place_id))
        .await?
        .map(|p| p.owner_id);

    tracing::info!("Order {} is now {:?}", order.id, order.status);
    announce(events, &order, owner_id.as_deref());
    Ok(())
}

pub struct OrderService {
    store: Arc<StoreService>,
    places: Arc<PlaceService>,
    bookings: Arc<BookingService>,
    events: Arc<EventDispatcher>,
    currency: String,
}

impl OrderService {
    pub fn new(
        store: Arc<StoreService>,
        places: Arc<PlaceService>,
        bookings: Arc<BookingService>,
        events: Arc<EventDispatcher>,
        currency: String,
    ) -> Self {
        Self {
            store,
            places,
            bookings,
            events,
            currency,
        }
    }

    async fn save(&self, order: &Order) -> HaulwayResult<()> {
        self.store.put(&StoreKeys::order_by_id(&order.id), order).await
    }

    pub async fn get(&self, order_id: &str) -> HaulwayResult<Order> {
        if !IdGenerator::validate_id(order_id, Some(IdType::Order)) {
            return Err(AppError::OrderNotFound(order_id.to_string()));
        }
        self.store
            .get(&StoreKeys::order_by_id(order_id))
            .await?
            .ok_or_else(|| AppError::OrderNotFound(order_id.to_string()))
    }

    fn delivery_request(place: &Place, order: &Order) -> BookingRequest {
        let items: u32 = order.lines.iter().map(|l| l.quantity).sum();
        let package_size = match items {
            0..=3 => PackageSize::Small,
            4..=10 => PackageSize::Medium,
            _ => PackageSize::Large,
        };

        BookingRequest {
            pickup: Stop {
                location: place.location,
                address: place.address.clone(),
                contact_phone: None,
                instructions: Some(format!("Collect order {}", order.id)),
            },
            dropoff: Some(order.dropoff.clone()),
            details: BookingDetails::Delivery {
                package_size,
                description: format!("Order {} from {}", order.id, place.name),
                recipient_name: order.recipient_name.clone(),
                recipient_phone: order.dropoff.contact_phone.clone().unwrap_or_default(),
            },
            notes: order.notes.clone(),
        }
    }

    pub async fn place_order(&self, customer: &User, request: OrderRequest) -> HaulwayResult<Order> {
        if !customer.role.can_book() {
            return Err(AppError::forbidden("This account cannot place orders"));
        }

        let place = self.places.get(&request.place_id).await?;
        if !place.is_open {
            return Err(AppError::bad_request(format!("{} is closed", place.name)));
        }

        let mut v = Validator::new();
        v.check(!request.lines.is_empty(), "lines", "must contain at least one item")
            .require_text(&request.recipient_name, "recipient_name")
            .require_text(&request.dropoff.address, "dropoff.address")
            .require_text(
                request.dropoff.contact_phone.as_deref().unwrap_or_default(),
                "dropoff.contact_phone",
            )
            .check(
                request.dropoff.location.validate("dropoff").is_ok(),
                "dropoff.location",
                "invalid coordinates",
            );
        for (i, line) in request.lines.iter().enumerate() {
            v.check(
                (1..=MAX_LINE_QUANTITY).contains(&line.quantity),
                &format!("lines[{}].quantity", i),
                "must be between 1 and 50",
            );
        }
        v.finish()?;

        let mut lines = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let item = place
                .item(&line.item_id)
                .ok_or_else(|| AppError::bad_request(format!("Item {} is not on the menu", line.item_id)))?;
            if !item.available {
                return Err(AppError::bad_request(format!("{} is unavailable", item.name)));
            }
            lines.push(OrderLine {
                item_id: item.id.clone(),
                name: item.name.clone(),
                unit_price: item.price,
                quantity: line.quantity,
            });
        }
        let subtotal = round_money(lines.iter().map(OrderLine::line_total).sum());

        let now = Utc::now();
        let mut order = Order {
            id: IdGenerator::generate(IdType::Order),
            customer_id: customer.id.clone(),
            place_id: place.id.clone(),
            lines,
            subtotal,
            delivery_fee: 0.0,
            total: subtotal,
            currency: self.currency.clone(),
            status: OrderStatus::Placed,
            dropoff: request.dropoff,
            recipient_name: request.recipient_name.trim().to_string(),
            notes: request.notes,
            rejection_reason: None,
            delivery_booking_id: None,
            created_at: now,
            updated_at: now,
        };

        let quote = self
            .bookings
            .quote(customer, &Self::delivery_request(&place, &order))
            .await?;
        order.delivery_fee = quote.fare.total;
        order.total = round_money(order.subtotal + order.delivery_fee);

        self.save(&order).await?;
        self.store
            .sadd(&StoreKeys::orders_by_customer(&customer.id), &order.id)
            .await?;
        self.store.sadd(&StoreKeys::orders_by_place(&place.id), &order.id).await?;

        tracing::info!(
            "Order {} placed at {} by {} - {:.2} {}",
            order.id,
            place.id,
            customer.id,
            order.total,
            order.currency
        );
        announce(&self.events, &order, Some(&place.owner_id));
        Ok(order)
    }

    /// Load an order together with its place, checking the caller runs that place.
    async fn managed(&self, caller: &User, order_id: &str) -> HaulwayResult<(Order, Place)> {
        let order = self.get(order_id).await?;
        let place = self.places.get(&order.place_id).await?;
        if !caller.is_admin() && place.owner_id != caller.id {
            return Err(AppError::OrderNotFound(order_id.to_string()));
        }
        Ok((order, place))
    }

    async fn merchant_step(&self, caller: &User, order_id: &str, next: OrderStatus) -> HaulwayResult<Order> {
        let (mut order, place) = self.managed(caller, order_id).await?;
        move_to(&mut order, next)?;
        self.save(&order).await?;

        tracing::info!("Order {} is now {:?}", order.id, order.status);
        announce(&self.events, &order, Some(&place.owner_id));
        Ok(order)
    }

    pub async fn accept(&self, caller: &User, order_id: &str) -> HaulwayResult<Order> {
        self.merchant_step(caller, order_id, OrderStatus::Accepted).await
    }

    pub async fn reject(&self, caller: &User, order_id: &str, reason: Option<String>) -> HaulwayResult<Order> {
        let (mut order, place) = self.managed(caller, order_id).await?;
        move_to(&mut order, OrderStatus::Rejected)?;
        order.rejection_reason = reason;
        self.save(&order).await?;

        tracing::info!("Order {} rejected", order.id);
        announce(&self.events, &order, Some(&place.owner_id));
        Ok(order)
    }

    pub async fn start_preparing(&self, caller: &User, order_id: &str) -> HaulwayResult<Order> {
        self.merchant_step(caller, order_id, OrderStatus::Preparing).await
    }

    /// Mark an order ready and book a courier. If no courier booking can be
    /// opened the order stays ready for pickup and can be dispatched later.
    pub async fn mark_ready(&self, caller: &User, order_id: &str) -> HaulwayResult<Order> {
        let (mut order, place) = self.managed(caller, order_id).await?;
        move_to(&mut order, OrderStatus::ReadyForPickup)?;
        self.save(&order).await?;
        announce(&self.events, &order, Some(&place.owner_id));

        match self.open_delivery(&mut order, &place).await {
            Ok(()) => Ok(order),
            Err(e) => {
                tracing::warn!("Delivery for order {} not booked yet: {}", order.id, e);
                Ok(order)
            }
        }
    }

    /// Retry the courier booking for an order waiting at the counter.
    pub async fn dispatch(&self, caller: &User, order_id: &str) -> HaulwayResult<Order> {
        let (mut order, place) = self.managed(caller, order_id).await?;
        if order.status != OrderStatus::ReadyForPickup {
            return Err(AppError::bad_request("Only orders ready for pickup can be dispatched"));
        }
        self.open_delivery(&mut order, &place).await?;
        Ok(order)
    }

    async fn open_delivery(&self, order: &mut Order, place: &Place) -> HaulwayResult<()> {
        let booking = self
            .bookings
            .open_booking(
                &order.customer_id,
                Self::delivery_request(place, order),
                Some(order.id.clone()),
            )
            .await?;

        move_to(order, OrderStatus::OutForDelivery)?;
        order.delivery_booking_id = Some(booking.id.clone());
        self.save(order).await?;

        tracing::info!("Order {} handed to delivery booking {}", order.id, booking.id);
        announce(&self.events, order, Some(&place.owner_id));
        Ok(())
    }

    pub async fn cancel(&self, customer: &User, order_id: &str) -> HaulwayResult<Order> {
        let mut order = self.get(order_id).await?;
        if order.customer_id != customer.id {
            return Err(AppError::OrderNotFound(order_id.to_string()));
        }
        move_to(&mut order, OrderStatus::Cancelled)?;
        self.save(&order).await?;

        let owner_id = self.places.get(&order.place_id).await.ok().map(|p| p.owner_id);
        tracing::info!("Order {} cancelled by customer", order.id);
        announce(&self.events, &order, owner_id.as_deref());
        Ok(order)
    }

    /// An order as seen by its customer, the place owner or an admin.
    pub async fn get_for(&self, caller: &User, order_id: &str) -> HaulwayResult<Order> {
        let order = self.get(order_id).await?;
        if caller.is_admin() || order.customer_id == caller.id {
            return Ok(order);
        }
        let place = self.places.get(&order.place_id).await?;
        if place.owner_id == caller.id {
            Ok(order)
        } else {
            Err(AppError::OrderNotFound(order_id.to_string()))
        }
    }

    /// Newest first. Merchants see orders across all their places.
    pub async fn list_mine(&self, caller: &User) -> HaulwayResult<Vec<Order>> {
        let mut orders: Vec<Order> = if caller.role == UserRole::Merchant {
            let mut all = Vec::new();
            for place in self.places.list_for_owner(&caller.id).await? {
                let mut batch: Vec<Order> = self
                    .store
                    .load_all(&StoreKeys::orders_by_place(&place.id), StoreKeys::order_by_id)
                    .await?;
                all.append(&mut batch);
            }
            all
        } else {
            self.store
                .load_all(&StoreKeys::orders_by_customer(&caller.id), StoreKeys::order_by_id)
                .await?
        };
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        booking::BookingStatus,
        driver::{Availability, DriverKind, DriverRegistration, LocationUpdate, Vehicle, VehicleType},
        order::OrderLineRequest,
        place::{ItemCreate, PlaceCreate},
        user::UserStatus,
        zone::{ZoneBoundary, ZoneCreate},
    };
    use crate::services::{
        driver_service::{DriverOperations, DriverService},
        messaging_service::MockNotificationService,
        realtime_service::RealtimeHub,
        subscription_service::SubscriptionService,
        webhook_service::{WebhookConfig, WebhookService},
        zone_service::ZoneService,
    };
    use crate::utils::GeoPoint;

    struct Fixture {
        orders: OrderService,
        places: Arc<PlaceService>,
        bookings: Arc<BookingService>,
        drivers: Arc<DriverService>,
        zones: Arc<ZoneService>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(StoreService::memory());
        let events = Arc::new(EventDispatcher::new(
            Arc::new(RealtimeHub::new()),
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
        let bookings = Arc::new(BookingService::new(
            Arc::clone(&store),
            Arc::clone(&zones),
            Arc::clone(&drivers),
            subscriptions,
            Arc::clone(&events),
            "GHS".into(),
            10.0,
        ));
        let places = Arc::new(PlaceService::new(Arc::clone(&store), Arc::clone(&zones)));
        let orders = OrderService::new(store, Arc::clone(&places), Arc::clone(&bookings), events, "GHS".into());
        Fixture {
            orders,
            places,
            bookings,
            drivers,
            zones,
        }
    }

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: IdGenerator::generate(IdType::User),
            role,
            status: UserStatus::Active,
            email: "o@example.com".into(),
            phone_number: "+233208888888".into(),
            first_name: "Efua".into(),
            last_name: "Owusu".into(),
            device_tokens: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    async fn accra(f: &Fixture) {
        f.zones
            .create(ZoneCreate {
                name: "Accra".into(),
                boundary: ZoneBoundary::Circle {
                    center: GeoPoint::new(5.6037, -0.1870),
                    radius_km: 25.0,
                },
                surge_multiplier: None,
                supported_kinds: vec![],
            })
            .await
            .unwrap();
    }

    async fn shop(f: &Fixture, merchant: &User) -> Place {
        let place = f
            .places
            .create(
                merchant,
                PlaceCreate {
                    name: "Papaye".into(),
                    category: "restaurant".into(),
                    description: None,
                    location: GeoPoint::new(5.60, -0.19),
                    address: "Cantonments Rd".into(),
                },
            )
            .await
            .unwrap();
        f.places
            .add_item(
                merchant,
                &place.id,
                ItemCreate {
                    name: "Fried rice and chicken".into(),
                    description: None,
                    price: 45.5,
                },
            )
            .await
            .unwrap()
    }

    fn request(place: &Place, quantity: u32) -> OrderRequest {
        OrderRequest {
            place_id: place.id.clone(),
            lines: vec![OrderLineRequest {
                item_id: place.items[0].id.clone(),
                quantity,
            }],
            dropoff: Stop {
                location: GeoPoint::new(5.62, -0.17),
                address: "East Legon".into(),
                contact_phone: Some("+233241111111".into()),
                instructions: None,
            },
            recipient_name: "Efua".into(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_order_to_doorstep() {
        let f = fixture();
        accra(&f).await;
        let merchant = user(UserRole::Merchant);
        let customer = user(UserRole::Customer);
        let place = shop(&f, &merchant).await;

        let order = f.orders.place_order(&customer, request(&place, 2)).await.unwrap();
        assert_eq!(order.subtotal, 91.0);
        assert!(order.delivery_fee > 0.0);
        assert_eq!(order.total, round_money(91.0 + order.delivery_fee));

        f.orders.accept(&merchant, &order.id).await.unwrap();
        f.orders.start_preparing(&merchant, &order.id).await.unwrap();
        let order = f.orders.mark_ready(&merchant, &order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::OutForDelivery);
        let booking_id = order.delivery_booking_id.clone().unwrap();

        let rider = user(UserRole::Driver);
        let profile = f
            .drivers
            .register_profile(
                &rider,
                DriverRegistration {
                    kind: DriverKind::DispatchRider,
                    vehicle: Vehicle {
                        license_plate: "M-24-GR-555".into(),
                        vehicle_type: VehicleType::Motorcycle,
                        make: "Honda".into(),
                        model: "Ace".into(),
                        color: "Red".into(),
                        capacity_kg: Some(20.0),
                    },
                },
            )
            .await
            .unwrap();
        f.drivers.verify(&profile.id).await.unwrap();
        f.drivers
            .update_location(
                &rider.id,
                LocationUpdate {
                    latitude: 5.601,
                    longitude: -0.191,
                    heading: None,
                    speed_kmh: None,
                },
            )
            .await
            .unwrap();
        f.drivers.set_availability(&rider.id, Availability::Online).await.unwrap();

        f.bookings.accept(&rider, &booking_id).await.unwrap();
        f.bookings.arrive(&rider, &booking_id).await.unwrap();
        f.bookings.start(&rider, &booking_id).await.unwrap();
        let booking = f.bookings.complete(&rider, &booking_id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);

        let order = f.orders.get_for(&customer, &order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_cancelled_courier_returns_order_to_counter() {
        let f = fixture();
        accra(&f).await;
        let merchant = user(UserRole::Merchant);
        let customer = user(UserRole::Customer);
        let place = shop(&f, &merchant).await;

        let order = f.orders.place_order(&customer, request(&place, 1)).await.unwrap();
        f.orders.accept(&merchant, &order.id).await.unwrap();
        f.orders.start_preparing(&merchant, &order.id).await.unwrap();
        let order = f.orders.mark_ready(&merchant, &order.id).await.unwrap();
        let booking_id = order.delivery_booking_id.clone().unwrap();

        f.bookings.cancel(&customer, &booking_id, None).await.unwrap();
        let order = f.orders.get(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::ReadyForPickup);
        assert!(order.delivery_booking_id.is_none());

        let order = f.orders.dispatch(&merchant, &order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::OutForDelivery);
        assert_ne!(order.delivery_booking_id.as_deref(), Some(booking_id.as_str()));
    }

    #[tokio::test]
    async fn test_order_rules() {
        let f = fixture();
        accra(&f).await;
        let merchant = user(UserRole::Merchant);
        let customer = user(UserRole::Customer);
        let place = shop(&f, &merchant).await;

        assert!(matches!(
            f.orders.place_order(&customer, request(&place, 0)).await,
            Err(AppError::ValidationFailed(_))
        ));

        let order = f.orders.place_order(&customer, request(&place, 1)).await.unwrap();
        let stranger = user(UserRole::Merchant);
        assert!(matches!(
            f.orders.accept(&stranger, &order.id).await,
            Err(AppError::OrderNotFound(_))
        ));
        assert!(f.orders.start_preparing(&merchant, &order.id).await.is_err());

        let order = f.orders.cancel(&customer, &order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(f.orders.accept(&merchant, &order.id).await.is_err());

        assert_eq!(f.orders.list_mine(&merchant).await.unwrap().len(), 1);
        assert_eq!(f.orders.list_mine(&customer).await.unwrap().len(), 1);

        f.places.set_open(&merchant, &place.id, false).await.unwrap();
        assert!(matches!(
            f.orders.place_order(&customer, request(&place, 1)).await,
            Err(AppError::BadRequest(_))
        ));
    }
}

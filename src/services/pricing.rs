// src/services/pricing.rs
use crate::{
    models::booking::{BookingDetails, BookingKind, Fare},
    utils::geo::round_money,
};

const SERVICE_FEE_RATE: f64 = 0.10;
const MOVING_HELPER_FEE: f64 = 60.0;
const MOVING_ROOM_FEE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareSchedule {
    pub base: f64,
    pub per_km: f64,
    pub per_minute: f64,
    pub minimum: f64,
}

impl FareSchedule {
    pub fn for_kind(kind: BookingKind) -> Self {
        let (base, per_km, per_minute, minimum) = match kind {
            BookingKind::Ride => (8.0, 2.0, 0.25, 12.0),
            BookingKind::Taxi => (10.0, 2.5, 0.30, 15.0),
            BookingKind::Delivery => (12.0, 2.2, 0.20, 15.0),
            BookingKind::Moving => (120.0, 6.0, 0.50, 200.0),
            BookingKind::Emergency => (50.0, 3.0, 0.0, 50.0),
        };
        Self { base, per_km, per_minute, minimum }
    }
}

/// Kind-specific extras on top of distance and time.
pub fn surcharge_for(details: &BookingDetails) -> f64 {
    match details {
        BookingDetails::Delivery { package_size, .. } => package_size.surcharge(),
        BookingDetails::Moving { rooms, helpers, .. } => {
            *helpers as f64 * MOVING_HELPER_FEE + *rooms as f64 * MOVING_ROOM_FEE
        }
        _ => 0.0,
    }
}

/// Inputs that vary per quote besides the booking itself.
#[derive(Debug, Clone)]
pub struct PricingContext {
    pub surge_multiplier: f64,
    pub discount_percent: f64,
    pub currency: String,
}

pub fn calculate_fare(details: &BookingDetails, distance_km: f64, eta_minutes: u32, ctx: &PricingContext) -> Fare {
    let schedule = FareSchedule::for_kind(details.kind());

    let base_fare = schedule.base;
    let distance_fare = distance_km * schedule.per_km;
    let time_fare = eta_minutes as f64 * schedule.per_minute;
    let surcharge = surcharge_for(details);
    let surge_multiplier = ctx.surge_multiplier.max(1.0);

    let subtotal = (base_fare + distance_fare + time_fare + surcharge) * surge_multiplier;
    let subtotal = subtotal.max(schedule.minimum);

    let discount = subtotal * ctx.discount_percent.clamp(0.0, 100.0) / 100.0;
    let discounted = subtotal - discount;
    let service_fee = discounted * SERVICE_FEE_RATE;

    Fare {
        base_fare: round_money(base_fare),
        distance_fare: round_money(distance_fare),
        time_fare: round_money(time_fare),
        surcharge: round_money(surcharge),
        surge_multiplier,
        discount: round_money(discount),
        service_fee: round_money(service_fee),
        total: round_money(discounted + service_fee),
        currency: ctx.currency.clone(),
    }
}

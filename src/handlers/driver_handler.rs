// src/handlers/driver_handler.rs
use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    auth::AuthUser,
    errors::HaulwayResult,
    models::{
        booking::{AvailableBooking, Booking, BookingFilter},
        driver::{AvailabilityUpdate, DriverProfile, DriverRegistration, LocationUpdate, NearbyDriver, NearbyQuery},
    },
    response::ApiResponse,
    services::{booking_service::BookingOperations, driver_service::DriverOperations},
    state::SharedState,
};

pub async fn register_profile(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(registration): Json<DriverRegistration>,
) -> HaulwayResult<ApiResponse<DriverProfile>> {
    let profile = state.driver_service.register_profile(&auth.user, registration).await?;
    Ok(ApiResponse::created(profile).with_message("Driver profile submitted for verification"))
}

pub async fn get_me(State(state): State<SharedState>, auth: AuthUser) -> HaulwayResult<ApiResponse<DriverProfile>> {
    let profile = state.driver_service.get_by_user(&auth.user.id).await?;
    Ok(ApiResponse::ok(profile))
}

pub async fn set_availability(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(update): Json<AvailabilityUpdate>,
) -> HaulwayResult<ApiResponse<DriverProfile>> {
    let profile = state
        .driver_service
        .set_availability(&auth.user.id, update.availability)
        .await?;
    Ok(ApiResponse::ok(profile))
}

pub async fn update_location(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(update): Json<LocationUpdate>,
) -> HaulwayResult<ApiResponse<DriverProfile>> {
    let profile = state.driver_service.update_location(&auth.user.id, update).await?;
    Ok(ApiResponse::ok(profile))
}

pub async fn nearby(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Query(query): Query<NearbyQuery>,
) -> HaulwayResult<ApiResponse<Vec<NearbyDriver>>> {
    let drivers = state.driver_service.find_nearby(query).await?;
    Ok(ApiResponse::ok(drivers))
}

pub async fn available_bookings(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> HaulwayResult<ApiResponse<Vec<AvailableBooking>>> {
    let bookings = state.booking_service.list_available(&auth.user).await?;
    Ok(ApiResponse::ok(bookings))
}

pub async fn my_bookings(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(filter): Query<BookingFilter>,
) -> HaulwayResult<ApiResponse<Vec<Booking>>> {
    let bookings = state.booking_service.list_for_driver(&auth.user, filter).await?;
    Ok(ApiResponse::ok(bookings))
}

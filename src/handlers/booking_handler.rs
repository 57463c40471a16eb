// src/handlers/booking_handler.rs
use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    auth::AuthUser,
    errors::HaulwayResult,
    models::booking::{Booking, BookingFilter, BookingQuote, BookingRequest, CancelRequest, RateRequest},
    response::ApiResponse,
    services::booking_service::BookingOperations,
    state::SharedState,
};

pub async fn quote(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<BookingRequest>,
) -> HaulwayResult<ApiResponse<BookingQuote>> {
    let quote = state.booking_service.quote(&auth.user, &request).await?;
    Ok(ApiResponse::ok(quote))
}

pub async fn create_booking(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<BookingRequest>,
) -> HaulwayResult<ApiResponse<Booking>> {
    let booking = state.booking_service.create(&auth.user, request).await?;
    Ok(ApiResponse::created(booking).with_message("Booking created"))
}

pub async fn list_bookings(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(filter): Query<BookingFilter>,
) -> HaulwayResult<ApiResponse<Vec<Booking>>> {
    let bookings = state.booking_service.list_for_customer(&auth.user.id, filter).await?;
    Ok(ApiResponse::ok(bookings))
}

pub async fn get_booking(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(booking_id): Path<String>,
) -> HaulwayResult<ApiResponse<Booking>> {
    let booking = state.booking_service.get_for(&auth.user, &booking_id).await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn accept(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(booking_id): Path<String>,
) -> HaulwayResult<ApiResponse<Booking>> {
    let booking = state.booking_service.accept(&auth.user, &booking_id).await?;
    Ok(ApiResponse::ok(booking).with_message("Booking accepted"))
}

pub async fn release(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(booking_id): Path<String>,
) -> HaulwayResult<ApiResponse<Booking>> {
    let booking = state.booking_service.release(&auth.user, &booking_id).await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn arrive(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(booking_id): Path<String>,
) -> HaulwayResult<ApiResponse<Booking>> {
    let booking = state.booking_service.arrive(&auth.user, &booking_id).await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn start(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(booking_id): Path<String>,
) -> HaulwayResult<ApiResponse<Booking>> {
    let booking = state.booking_service.start(&auth.user, &booking_id).await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn complete(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(booking_id): Path<String>,
) -> HaulwayResult<ApiResponse<Booking>> {
    let booking = state.booking_service.complete(&auth.user, &booking_id).await?;
    Ok(ApiResponse::ok(booking).with_message("Booking completed"))
}

pub async fn cancel(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(booking_id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> HaulwayResult<ApiResponse<Booking>> {
    let reason = body.and_then(|Json(b)| b.reason);
    let booking = state.booking_service.cancel(&auth.user, &booking_id, reason).await?;
    Ok(ApiResponse::ok(booking).with_message("Booking cancelled"))
}

pub async fn rate(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(booking_id): Path<String>,
    Json(rating): Json<RateRequest>,
) -> HaulwayResult<ApiResponse<Booking>> {
    let booking = state.booking_service.rate(&auth.user, &booking_id, rating).await?;
    Ok(ApiResponse::ok(booking))
}

// src/handlers/admin_handler.rs
use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    auth::AdminUser,
    errors::HaulwayResult,
    models::{
        booking::{Booking, BookingFilter, CancelRequest},
        driver::DriverProfile,
        user::{TokenResponse, UserFilter, UserResponse, UserStatusUpdate},
    },
    response::ApiResponse,
    services::{
        admin_service::Dashboard, booking_service::BookingOperations, driver_service::DriverOperations,
        user_service::UserOperations,
    },
    state::SharedState,
};

pub async fn dashboard(State(state): State<SharedState>, _admin: AdminUser) -> HaulwayResult<ApiResponse<Dashboard>> {
    Ok(ApiResponse::ok(state.admin_service.dashboard().await?))
}

pub async fn list_users(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Query(filter): Query<UserFilter>,
) -> HaulwayResult<ApiResponse<Vec<UserResponse>>> {
    let users = state.user_service.list_users(filter).await?;
    Ok(ApiResponse::ok(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn set_user_status(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
    Json(update): Json<UserStatusUpdate>,
) -> HaulwayResult<ApiResponse<UserResponse>> {
    let user = state.user_service.set_status(&user_id, update.status).await?;
    tracing::info!("Admin {} set user {} to {:?}", admin.id, user.id, user.status);
    Ok(ApiResponse::ok(user.into()))
}

pub async fn issue_token(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<String>,
) -> HaulwayResult<ApiResponse<TokenResponse>> {
    let access_token = state.user_service.issue_token(&user_id).await?;
    tracing::info!("Admin {} issued a token for user {}", admin.id, user_id);
    Ok(ApiResponse::created(TokenResponse { user_id, access_token }))
}

pub async fn list_drivers(
    State(state): State<SharedState>,
    _admin: AdminUser,
) -> HaulwayResult<ApiResponse<Vec<DriverProfile>>> {
    Ok(ApiResponse::ok(state.driver_service.list_drivers().await?))
}

pub async fn verify_driver(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Path(driver_id): Path<String>,
) -> HaulwayResult<ApiResponse<DriverProfile>> {
    Ok(ApiResponse::ok(state.driver_service.verify(&driver_id).await?).with_message("Driver verified"))
}

pub async fn list_bookings(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Query(filter): Query<BookingFilter>,
) -> HaulwayResult<ApiResponse<Vec<Booking>>> {
    Ok(ApiResponse::ok(state.booking_service.list_all(filter).await?))
}

pub async fn cancel_booking(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    Path(booking_id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> HaulwayResult<ApiResponse<Booking>> {
    let reason = body.and_then(|Json(b)| b.reason);
    let booking = state.booking_service.cancel(&admin, &booking_id, reason).await?;
    Ok(ApiResponse::ok(booking).with_message("Booking cancelled"))
}

// src/handlers/user_handler.rs
use axum::{Json, extract::State};

use crate::{
    auth::AuthUser,
    errors::HaulwayResult,
    models::user::{DeviceTokenRequest, UserResponse, UserUpdate},
    response::ApiResponse,
    services::user_service::UserOperations,
    state::SharedState,
};

pub async fn get_me(auth: AuthUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(auth.user.into())
}

pub async fn update_me(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(update): Json<UserUpdate>,
) -> HaulwayResult<ApiResponse<UserResponse>> {
    let user = state.user_service.update_profile(&auth.user.id, update).await?;
    Ok(ApiResponse::ok(user.into()))
}

pub async fn add_device_token(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<DeviceTokenRequest>,
) -> HaulwayResult<ApiResponse<UserResponse>> {
    let user = state
        .user_service
        .add_device_token(&auth.user.id, request.device_token)
        .await?;
    Ok(ApiResponse::ok(user.into()).with_message("Device registered"))
}

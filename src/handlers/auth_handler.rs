// src/handlers/auth_handler.rs
use axum::{Json, extract::State};

use crate::{
    auth::AuthUser,
    errors::HaulwayResult,
    models::user::{RegistrationResponse, UserRegistration},
    response::ApiResponse,
    services::user_service::UserOperations,
    state::SharedState,
};

pub async fn register(
    State(state): State<SharedState>,
    Json(registration): Json<UserRegistration>,
) -> HaulwayResult<ApiResponse<RegistrationResponse>> {
    let (user, access_token) = state.user_service.register(registration).await?;
    Ok(ApiResponse::created(RegistrationResponse {
        user: user.into(),
        access_token,
    })
    .with_message("Account created"))
}

pub async fn logout(State(state): State<SharedState>, auth: AuthUser) -> HaulwayResult<ApiResponse<()>> {
    state.user_service.revoke_token(&auth.token).await?;
    Ok(ApiResponse::ok(()).with_message("Signed out"))
}

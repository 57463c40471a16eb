// src/handlers/webhook_handler.rs
use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    auth::AuthUser,
    errors::HaulwayResult,
    models::webhook::{WebhookCreate, WebhookEndpoint},
    response::ApiResponse,
    state::SharedState,
};

/// The secret is returned once, in this response only.
pub async fn register(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<WebhookCreate>,
) -> HaulwayResult<ApiResponse<WebhookEndpoint>> {
    let endpoint = state.webhook_service.register(&auth.user, request).await?;
    Ok(ApiResponse::created(endpoint).with_message("Store the secret now, it is not shown again"))
}

pub async fn list(State(state): State<SharedState>, auth: AuthUser) -> HaulwayResult<ApiResponse<Vec<WebhookEndpoint>>> {
    Ok(ApiResponse::ok(state.webhook_service.list_for_owner(&auth.user.id).await?))
}

pub async fn delete(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(webhook_id): Path<String>,
) -> HaulwayResult<ApiResponse<()>> {
    state.webhook_service.delete(&auth.user, &webhook_id).await?;
    Ok(ApiResponse::ok(()).with_message("Webhook deleted"))
}

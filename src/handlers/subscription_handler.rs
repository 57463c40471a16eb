// src/handlers/subscription_handler.rs
use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    auth::{AdminUser, AuthUser},
    errors::HaulwayResult,
    models::subscription::{PlanCreate, SubscribeRequest, Subscription, SubscriptionPlan},
    response::ApiResponse,
    state::SharedState,
};

pub async fn list_plans(State(state): State<SharedState>) -> HaulwayResult<ApiResponse<Vec<SubscriptionPlan>>> {
    Ok(ApiResponse::ok(state.subscription_service.list_active_plans().await?))
}

pub async fn subscribe(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<SubscribeRequest>,
) -> HaulwayResult<ApiResponse<Subscription>> {
    let subscription = state.subscription_service.subscribe(&auth.user, request).await?;
    Ok(ApiResponse::created(subscription).with_message("Subscription active"))
}

pub async fn current(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> HaulwayResult<ApiResponse<Option<Subscription>>> {
    Ok(ApiResponse::ok(state.subscription_service.current(&auth.user.id).await?))
}

pub async fn cancel(State(state): State<SharedState>, auth: AuthUser) -> HaulwayResult<ApiResponse<Subscription>> {
    let subscription = state.subscription_service.cancel(&auth.user.id).await?;
    Ok(ApiResponse::ok(subscription).with_message("Subscription cancelled"))
}

pub async fn create_plan(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Json(request): Json<PlanCreate>,
) -> HaulwayResult<ApiResponse<SubscriptionPlan>> {
    Ok(ApiResponse::created(state.subscription_service.create_plan(request).await?))
}

pub async fn deactivate_plan(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Path(plan_id): Path<String>,
) -> HaulwayResult<ApiResponse<SubscriptionPlan>> {
    Ok(ApiResponse::ok(state.subscription_service.deactivate_plan(&plan_id).await?))
}

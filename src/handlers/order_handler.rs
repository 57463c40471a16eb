// src/handlers/order_handler.rs
use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    auth::AuthUser,
    errors::HaulwayResult,
    models::order::{Order, OrderRequest, RejectRequest},
    response::ApiResponse,
    state::SharedState,
};

pub async fn place_order(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<OrderRequest>,
) -> HaulwayResult<ApiResponse<Order>> {
    let order = state.order_service.place_order(&auth.user, request).await?;
    Ok(ApiResponse::created(order).with_message("Order placed"))
}

pub async fn list_orders(State(state): State<SharedState>, auth: AuthUser) -> HaulwayResult<ApiResponse<Vec<Order>>> {
    Ok(ApiResponse::ok(state.order_service.list_mine(&auth.user).await?))
}

pub async fn get_order(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(order_id): Path<String>,
) -> HaulwayResult<ApiResponse<Order>> {
    Ok(ApiResponse::ok(state.order_service.get_for(&auth.user, &order_id).await?))
}

pub async fn accept(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(order_id): Path<String>,
) -> HaulwayResult<ApiResponse<Order>> {
    Ok(ApiResponse::ok(state.order_service.accept(&auth.user, &order_id).await?))
}

pub async fn reject(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(order_id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> HaulwayResult<ApiResponse<Order>> {
    let reason = body.and_then(|Json(b)| b.reason);
    Ok(ApiResponse::ok(state.order_service.reject(&auth.user, &order_id, reason).await?))
}

pub async fn prepare(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(order_id): Path<String>,
) -> HaulwayResult<ApiResponse<Order>> {
    Ok(ApiResponse::ok(
        state.order_service.start_preparing(&auth.user, &order_id).await?,
    ))
}

pub async fn ready(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(order_id): Path<String>,
) -> HaulwayResult<ApiResponse<Order>> {
    Ok(ApiResponse::ok(state.order_service.mark_ready(&auth.user, &order_id).await?))
}

pub async fn dispatch(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(order_id): Path<String>,
) -> HaulwayResult<ApiResponse<Order>> {
    Ok(ApiResponse::ok(state.order_service.dispatch(&auth.user, &order_id).await?))
}

pub async fn cancel(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(order_id): Path<String>,
) -> HaulwayResult<ApiResponse<Order>> {
    Ok(ApiResponse::ok(state.order_service.cancel(&auth.user, &order_id).await?).with_message("Order cancelled"))
}

// src/handlers/place_handler.rs
use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    auth::AuthUser,
    errors::HaulwayResult,
    models::place::{ItemCreate, ItemUpdate, OpenUpdate, Place, PlaceCreate, PlaceUpdate},
    response::ApiResponse,
    state::SharedState,
};

pub async fn create_place(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<PlaceCreate>,
) -> HaulwayResult<ApiResponse<Place>> {
    let place = state.place_service.create(&auth.user, request).await?;
    Ok(ApiResponse::created(place))
}

pub async fn list_places(State(state): State<SharedState>) -> HaulwayResult<ApiResponse<Vec<Place>>> {
    Ok(ApiResponse::ok(state.place_service.list_all().await?))
}

pub async fn my_places(State(state): State<SharedState>, auth: AuthUser) -> HaulwayResult<ApiResponse<Vec<Place>>> {
    Ok(ApiResponse::ok(state.place_service.list_for_owner(&auth.user.id).await?))
}

pub async fn get_place(
    State(state): State<SharedState>,
    Path(place_id): Path<String>,
) -> HaulwayResult<ApiResponse<Place>> {
    Ok(ApiResponse::ok(state.place_service.get(&place_id).await?))
}

pub async fn update_place(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(place_id): Path<String>,
    Json(update): Json<PlaceUpdate>,
) -> HaulwayResult<ApiResponse<Place>> {
    Ok(ApiResponse::ok(state.place_service.update(&auth.user, &place_id, update).await?))
}

pub async fn set_open(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(place_id): Path<String>,
    Json(update): Json<OpenUpdate>,
) -> HaulwayResult<ApiResponse<Place>> {
    Ok(ApiResponse::ok(
        state.place_service.set_open(&auth.user, &place_id, update.is_open).await?,
    ))
}

pub async fn add_item(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(place_id): Path<String>,
    Json(request): Json<ItemCreate>,
) -> HaulwayResult<ApiResponse<Place>> {
    let place = state.place_service.add_item(&auth.user, &place_id, request).await?;
    Ok(ApiResponse::created(place))
}

pub async fn update_item(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path((place_id, item_id)): Path<(String, String)>,
    Json(update): Json<ItemUpdate>,
) -> HaulwayResult<ApiResponse<Place>> {
    Ok(ApiResponse::ok(
        state
            .place_service
            .update_item(&auth.user, &place_id, &item_id, update)
            .await?,
    ))
}

pub async fn remove_item(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path((place_id, item_id)): Path<(String, String)>,
) -> HaulwayResult<ApiResponse<Place>> {
    Ok(ApiResponse::ok(
        state.place_service.remove_item(&auth.user, &place_id, &item_id).await?,
    ))
}

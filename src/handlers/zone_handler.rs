// src/handlers/zone_handler.rs
use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    auth::{AdminUser, AuthUser},
    errors::HaulwayResult,
    models::zone::{DetectQuery, ServiceZone, ZoneCreate, ZoneUpdate},
    response::ApiResponse,
    state::SharedState,
    utils::GeoPoint,
};

pub async fn list_zones(State(state): State<SharedState>, _auth: AuthUser) -> HaulwayResult<ApiResponse<Vec<ServiceZone>>> {
    Ok(ApiResponse::ok(state.zone_service.list().await?))
}

pub async fn get_zone(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(zone_id): Path<String>,
) -> HaulwayResult<ApiResponse<ServiceZone>> {
    Ok(ApiResponse::ok(state.zone_service.get(&zone_id).await?))
}

pub async fn detect(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Query(query): Query<DetectQuery>,
) -> HaulwayResult<ApiResponse<Option<ServiceZone>>> {
    let point = GeoPoint::new(query.latitude, query.longitude);
    point.validate("location")?;
    Ok(ApiResponse::ok(state.zone_service.detect(&point, query.kind).await?))
}

pub async fn create_zone(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<ZoneCreate>,
) -> HaulwayResult<ApiResponse<ServiceZone>> {
    let zone = state.zone_service.create(request).await?;
    tracing::info!("Zone {} created by admin {}", zone.id, admin.id);
    Ok(ApiResponse::created(zone))
}

pub async fn update_zone(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Path(zone_id): Path<String>,
    Json(update): Json<ZoneUpdate>,
) -> HaulwayResult<ApiResponse<ServiceZone>> {
    Ok(ApiResponse::ok(state.zone_service.update(&zone_id, update).await?))
}

pub async fn delete_zone(
    State(state): State<SharedState>,
    _admin: AdminUser,
    Path(zone_id): Path<String>,
) -> HaulwayResult<ApiResponse<()>> {
    state.zone_service.delete(&zone_id).await?;
    Ok(ApiResponse::ok(()).with_message("Zone deleted"))
}

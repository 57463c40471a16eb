// src/handlers/search_handler.rs
use axum::extract::{Query, State};

use crate::{
    errors::HaulwayResult,
    models::place::{SearchHit, SearchQuery},
    response::ApiResponse,
    state::SharedState,
};

pub async fn search(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> HaulwayResult<ApiResponse<Vec<SearchHit>>> {
    Ok(ApiResponse::ok(state.search_service.search(query).await?))
}

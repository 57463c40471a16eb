// src/handlers/health_handler.rs
use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub store: &'static str,
    pub realtime_clients: usize,
    pub version: &'static str,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthReport> {
    let store_up = state.store.health_check().await;
    Json(HealthReport {
        status: if store_up { "ok" } else { "degraded" },
        store: if store_up { "up" } else { "down" },
        realtime_clients: state.realtime.connected_clients(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{delete, get};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;
use crate::{api, live};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/state", get(api::station_snapshot))
        .route("/state/{station}", delete(api::reset_station))
        .route("/templates/{project}/{sequence}", get(api::template))
        .route("/ws", get(live::ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

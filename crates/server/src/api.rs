//! JSON endpoints: health, the station snapshot, template lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use mrqa_compliance::ComplianceRecord;
use mrqa_store::{StoreError, Template};

use crate::state::AppState;

// ── Health ────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub stations: usize,
    pub subscribers: usize,
    pub watching: Vec<String>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stations = state.broadcaster.tracker().read().await.len();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: state.inferencer.store().backend().backend_name(),
        stations,
        subscribers: state.broadcaster.subscriber_count(),
        watching: state
            .watch_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect(),
    })
}

// ── Stations ──────────────────────────────────────────────────────

/// Last check result per station.
pub async fn station_snapshot(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, ComplianceRecord>> {
    Json(state.broadcaster.snapshot().await)
}

pub async fn reset_station(
    State(state): State<Arc<AppState>>,
    Path(station): Path<String>,
) -> StatusCode {
    if state.broadcaster.tracker().write().await.reset(&station) {
        info!(station = %station, "station reset over http");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// ── Templates ─────────────────────────────────────────────────────

/// `project` and `sequence` may carry `*` wildcards.
pub async fn template(
    State(state): State<Arc<AppState>>,
    Path((project, sequence)): Path<(String, String)>,
) -> Result<Json<Template>, (StatusCode, String)> {
    match state.inferencer.get_template(&project, &sequence).await {
        Ok(Some(t)) => Ok(Json(t)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            format!("no template for {project}/{sequence}"),
        )),
        Err(e @ StoreError::InvalidPattern { .. }) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            warn!(error = %e, "template lookup failed");
            Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}

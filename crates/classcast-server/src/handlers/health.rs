use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use classcast_registry::MetricsSnapshot;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    active_sessions: usize,
    stored_bytes: u64,
    rate_limited_clients: usize,
    counters: MetricsSnapshot,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let stats = state.registry.stats();

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_sessions: stats.active_sessions,
            stored_bytes: stats.stored_bytes,
            rate_limited_clients: state.limiter.tracked(),
            counters: stats.counters,
        }),
    )
}

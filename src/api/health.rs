use crate::api::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    backend: String,
    lookup: String,
    uptime_seconds: u64,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let engine = state.registry.engine();
    let connected = engine.ping().await;

    Json(HealthResponse {
        status: if connected {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        backend: engine.backend().to_string(),
        lookup: state.content.lookup_source().to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

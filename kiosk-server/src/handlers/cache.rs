use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FlushParams {
    pub device: Option<String>,
}

/// `POST /cache/flush`
pub async fn flush_caches(
    State(state): State<AppState>,
    Query(params): Query<FlushParams>,
) -> Json<Value> {
    let device = params.device.unwrap_or_default();
    state.orchestrator.flush(&device);
    Json(json!({ "flushed": true }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "batches": state.orchestrator.batch_cache().count(),
        "prefetched_keys": state.orchestrator.rendered_cache().key_count(),
    }))
}

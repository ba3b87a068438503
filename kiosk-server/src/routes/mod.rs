use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{asset, cache},
    infra::app_state::AppState,
};

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/asset/new", get(asset::next_asset))
        .route("/asset/previous", get(asset::previous_asset))
        .route("/cache/flush", post(cache::flush_caches))
        .route("/health", get(cache::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

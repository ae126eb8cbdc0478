pub mod albums;
pub mod cache;
pub mod proxy;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::state::{AppState, HealthResponse};

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/albums", get(albums::list_albums))
        .route("/audio-proxy", get(proxy::audio_proxy))
        .route("/image-proxy", get(proxy::image_proxy))
        .route("/signed-url", get(proxy::signed_url))
        .route("/cache/invalidate", post(cache::invalidate))
        .route("/cache/status", get(cache::status))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

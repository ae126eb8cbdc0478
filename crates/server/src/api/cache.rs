use axum::extract::State;
use axum::Json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::state::{AppState, CacheStatusResponse, InvalidateResponse};

pub async fn invalidate(State(state): State<AppState>) -> Json<InvalidateResponse> {
    state.mapping_cache.invalidate();
    Json(InvalidateResponse {
        message: "Cache invalidated".to_string(),
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
    })
}

pub async fn status(State(state): State<AppState>) -> Json<CacheStatusResponse> {
    let cache_state = state.mapping_cache.state();
    let snapshot = state.mapping_cache.last_known();
    Json(CacheStatusResponse {
        state: cache_state.label(),
        entries: snapshot.as_ref().map_or(0, |snapshot| snapshot.mapping.len()),
        age_secs: snapshot.map(|snapshot| snapshot.age().as_secs()),
        ttl_secs: state.mapping_cache.ttl().as_secs(),
    })
}

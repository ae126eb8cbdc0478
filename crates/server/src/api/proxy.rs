use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use library::{resolve_candidates, FolderMapping, Resolution, RetrievalRequest};
use tracing::{debug, warn};

use crate::state::{AppState, KeyQuery, SignedUrlResponse};
use crate::streaming::{sign_candidates, stream_candidates};
use crate::utils::{
    json_error_response, plain_proxy_error_response, proxy_error_response, requested_key,
};

pub async fn audio_proxy(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(key) = requested_key(query.key.as_deref()) else {
        return json_error_response(StatusCode::BAD_REQUEST, "missing key parameter");
    };
    // A Range header that is not visible ASCII parses as malformed.
    let range = headers
        .get(header::RANGE)
        .map(|value| value.to_str().unwrap_or_default());

    let resolution = resolve_request(&state, &key).await;
    match stream_candidates(state.store.as_ref(), &key, &resolution.candidates, range).await {
        Ok(response) => response,
        Err(err) => proxy_error_response(&err),
    }
}

/// Images are always served whole.
pub async fn image_proxy(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Response {
    let Some(key) = requested_key(query.key.as_deref()) else {
        return json_error_response(StatusCode::BAD_REQUEST, "missing key parameter");
    };

    let resolution = resolve_request(&state, &key).await;
    match stream_candidates(state.store.as_ref(), &key, &resolution.candidates, None).await {
        Ok(response) => response,
        Err(err) => plain_proxy_error_response(&err),
    }
}

pub async fn signed_url(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Response {
    let Some(key) = requested_key(query.key.as_deref()) else {
        return json_error_response(StatusCode::BAD_REQUEST, "missing key parameter");
    };

    let expires_in = state.config.signed_url_ttl();
    let resolution = resolve_request(&state, &key).await;
    match sign_candidates(state.store.as_ref(), &key, &resolution.candidates, expires_in).await {
        Ok((url, key)) => Json(SignedUrlResponse {
            url,
            key,
            expires_in: expires_in.as_secs(),
        })
        .into_response(),
        Err(err) => proxy_error_response(&err),
    }
}

/// Resolves against the cached mapping. When the mapping cannot be rebuilt the last
/// good snapshot is used, or no mapping at all, so constructed keys are still tried.
pub(crate) async fn resolve_request(state: &AppState, key: &str) -> Resolution {
    let request = RetrievalRequest::from_key(key);
    if let RetrievalRequest::Verbatim(_) = request {
        return resolve_candidates(&request, &FolderMapping::new());
    }

    let snapshot = match state.mapping_cache.get_mapping().await {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!(requested_key = key, "Resolving without a fresh folder mapping: {}", err);
            state.mapping_cache.last_known()
        }
    };
    let empty = FolderMapping::new();
    let mapping = snapshot
        .as_ref()
        .map(|snapshot| &snapshot.mapping)
        .unwrap_or(&empty);

    let resolution = resolve_candidates(&request, mapping);
    debug!(
        requested_key = key,
        tier = resolution.tier.label(),
        candidates = resolution.candidates.len(),
        "resolved retrieval key"
    );
    resolution
}

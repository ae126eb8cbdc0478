use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::state::{ErrorResponse, ProxyErrorResponse};
use crate::streaming::{unsatisfied_range_header, ProxyError};

pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn json_error_response(status: StatusCode, message: impl Into<String>) -> Response {
    json_error(status, message).into_response()
}

/// Audio-style error body: `{error, requestedKey, message}`.
pub fn proxy_error_response(err: &ProxyError) -> Response {
    let mut response = (
        err.status(),
        Json(ProxyErrorResponse {
            error: err.label().to_string(),
            requested_key: err.requested_key().to_string(),
            message: err.to_string(),
        }),
    )
        .into_response();
    if let ProxyError::RangeNotSatisfiable { size, .. } = err {
        response
            .headers_mut()
            .insert(header::CONTENT_RANGE, unsatisfied_range_header(*size));
    }
    response
}

/// Image-style error body: `{error}` only.
pub fn plain_proxy_error_response(err: &ProxyError) -> Response {
    json_error_response(err.status(), err.label())
}

/// The `key` query parameter, `None` when missing or blank.
pub fn requested_key(key: Option<&str>) -> Option<String> {
    key.filter(|key| !key.trim().is_empty())
        .map(str::to_string)
}

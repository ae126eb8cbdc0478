use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use tracing::{debug, warn};

use crate::range::RangeSpec;
use crate::store::{ObjectBody, ObjectSource, StoreError};

const CACHE_CONTROL_VALUE: &str = "public, max-age=31536000";

#[derive(Debug)]
pub enum ProxyError {
    NotFound { requested_key: String, attempted: usize },
    MalformedRange { requested_key: String, value: String },
    RangeNotSatisfiable { requested_key: String, size: u64 },
    Upstream { requested_key: String, message: String },
    Unsupported { requested_key: String, message: String },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::MalformedRange { .. } => StatusCode::BAD_REQUEST,
            ProxyError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ProxyError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Unsupported { .. } => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// The key the client asked for, never an internal candidate.
    pub fn requested_key(&self) -> &str {
        match self {
            ProxyError::NotFound { requested_key, .. }
            | ProxyError::MalformedRange { requested_key, .. }
            | ProxyError::RangeNotSatisfiable { requested_key, .. }
            | ProxyError::Upstream { requested_key, .. }
            | ProxyError::Unsupported { requested_key, .. } => requested_key,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProxyError::NotFound { .. } => "File not found",
            ProxyError::MalformedRange { .. } => "Malformed range",
            ProxyError::RangeNotSatisfiable { .. } => "Range not satisfiable",
            ProxyError::Upstream { .. } => "Storage error",
            ProxyError::Unsupported { .. } => "Not supported",
        }
    }
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError::NotFound {
                requested_key,
                attempted,
            } => write!(
                f,
                "no object found for {} after {} candidate keys",
                requested_key, attempted
            ),
            ProxyError::MalformedRange { value, .. } => {
                write!(f, "malformed range header: {}", value)
            }
            ProxyError::RangeNotSatisfiable { size, .. } => {
                write!(f, "range not satisfiable for object of {} bytes", size)
            }
            ProxyError::Upstream { message, .. } => write!(f, "object store error: {}", message),
            ProxyError::Unsupported { message, .. } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ProxyError {}

enum AttemptError {
    Store(StoreError),
    Unsatisfiable { size: u64 },
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        AttemptError::Store(err)
    }
}

/// Streams the first candidate that can be read, in order.
///
/// With a range header each candidate is HEADed for its size before the span is
/// fetched. A missing or failing candidate moves on to the next one; a range that
/// does not fit an existing object stops the search.
pub async fn stream_candidates(
    source: &dyn ObjectSource,
    requested_key: &str,
    candidates: &[String],
    range_header: Option<&str>,
) -> Result<Response, ProxyError> {
    let range_spec = match range_header {
        Some(value) => Some(RangeSpec::parse(value).map_err(|_| ProxyError::MalformedRange {
            requested_key: requested_key.to_string(),
            value: value.to_string(),
        })?),
        None => None,
    };

    let mut last_failure: Option<StoreError> = None;
    for key in candidates {
        let attempt = match range_spec {
            Some(spec) => fetch_range(source, key, spec).await,
            None => source.get_object(key, None).await.map_err(AttemptError::from),
        };
        match attempt {
            Ok(body) => {
                debug!(requested_key, key = %key, ranged = body.range.is_some(), "serving candidate");
                return Ok(object_response(body));
            }
            Err(AttemptError::Unsatisfiable { size }) => {
                return Err(ProxyError::RangeNotSatisfiable {
                    requested_key: requested_key.to_string(),
                    size,
                });
            }
            Err(AttemptError::Store(err)) => {
                debug!(requested_key, key = %key, error = %err, "candidate failed");
                last_failure = Some(err);
            }
        }
    }

    Err(exhausted(requested_key, candidates, last_failure))
}

/// Finds the first existing candidate and returns a time-limited URL for it along with
/// the storage key that was signed.
pub async fn sign_candidates(
    source: &dyn ObjectSource,
    requested_key: &str,
    candidates: &[String],
    expires_in: Duration,
) -> Result<(String, String), ProxyError> {
    let mut last_failure: Option<StoreError> = None;
    for key in candidates {
        if let Err(err) = source.head_object(key).await {
            debug!(requested_key, key = %key, error = %err, "candidate failed");
            last_failure = Some(err);
            continue;
        }
        return match source.signed_url(key, expires_in).await {
            Ok(url) => Ok((url, key.clone())),
            Err(StoreError::Unsupported(what)) => Err(ProxyError::Unsupported {
                requested_key: requested_key.to_string(),
                message: what.to_string(),
            }),
            Err(err) => Err(ProxyError::Upstream {
                requested_key: requested_key.to_string(),
                message: err.to_string(),
            }),
        };
    }

    Err(exhausted(requested_key, candidates, last_failure))
}

async fn fetch_range(
    source: &dyn ObjectSource,
    key: &str,
    spec: RangeSpec,
) -> Result<ObjectBody, AttemptError> {
    let head = source.head_object(key).await?;
    let range = spec
        .resolve(head.size)
        .map_err(|_| AttemptError::Unsatisfiable { size: head.size })?;
    Ok(source.get_object(key, Some(range)).await?)
}

fn exhausted(requested_key: &str, candidates: &[String], last_failure: Option<StoreError>) -> ProxyError {
    warn!(
        requested_key,
        attempted = ?candidates,
        "no candidate key could be served"
    );
    match last_failure {
        Some(err) if !err.is_not_found() => ProxyError::Upstream {
            requested_key: requested_key.to_string(),
            message: err.to_string(),
        },
        _ => ProxyError::NotFound {
            requested_key: requested_key.to_string(),
            attempted: candidates.len(),
        },
    }
}

fn object_response(body: ObjectBody) -> Response {
    let mut response = Response::new(Body::from_stream(body.stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&body.content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_VALUE),
    );
    match body.range {
        Some(range) => {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(range.len()));
            if let Ok(value) = HeaderValue::from_str(&range.content_range(body.size)) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
        }
        None => {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.size));
        }
    }
    response
}

/// `Content-Range: bytes */<size>` for 416 responses.
pub fn unsatisfied_range_header(size: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("bytes */{}", size))
        .unwrap_or(HeaderValue::from_static("bytes */0"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{header, StatusCode};

    use super::{sign_candidates, stream_candidates, ProxyError};
    use crate::store::tests::{memory_store, FlakySource};

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn object(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn range_request_yields_partial_content() {
        let data = object(1000);
        let store = memory_store(&[("albums/Boston/Foreplay.mp3", data.clone())]).await;
        let response = stream_candidates(
            &store,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston/Foreplay.mp3"]),
            Some("bytes=0-99"),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-99/1000");
        assert_eq!(headers[header::CONTENT_LENGTH], "100");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=31536000");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), &data[..100]);
    }

    #[tokio::test]
    async fn open_ended_range_runs_to_last_byte() {
        let store = memory_store(&[("albums/Boston/Foreplay.mp3", object(1000))]).await;
        let response = stream_candidates(
            &store,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston/Foreplay.mp3"]),
            Some("bytes=900-"),
        )
        .await
        .unwrap();
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 900-999/1000");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
    }

    #[tokio::test]
    async fn full_request_falls_through_missing_candidates() {
        let store = memory_store(&[("albums/Boston - Boston/Foreplay.mp3", object(64))]).await;
        let response = stream_candidates(
            &store,
            "Boston/Boston/Foreplay.mp3",
            &keys(&[
                "albums/Boston/Foreplay.mp3",
                "albums/Boston - Boston/Foreplay.mp3",
                "albums/Boston-Boston/Foreplay.mp3",
            ]),
            None,
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "64");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 64);
    }

    #[tokio::test]
    async fn exhaustion_reports_the_requested_key() {
        let store = memory_store(&[]).await;
        let err = stream_candidates(
            &store,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston/Foreplay.mp3", "albums/Boston - Boston/Foreplay.mp3"]),
            Some("bytes=0-99"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProxyError::NotFound { attempted: 2, .. }));
        assert_eq!(err.requested_key(), "Boston/Boston/Foreplay.mp3");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_range_is_a_client_error() {
        let store = memory_store(&[("albums/Boston/Foreplay.mp3", object(10))]).await;
        let err = stream_candidates(
            &store,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston/Foreplay.mp3"]),
            Some("bytes=oops"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProxyError::MalformedRange { .. }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn start_beyond_size_is_not_satisfiable() {
        let store = memory_store(&[("albums/Boston/Foreplay.mp3", object(10))]).await;
        let err = stream_candidates(
            &store,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston/Foreplay.mp3"]),
            Some("bytes=50-60"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProxyError::RangeNotSatisfiable { size: 10, .. }));
    }

    #[tokio::test]
    async fn signing_checks_existence_first() {
        let store = memory_store(&[("albums/Boston/Foreplay.mp3", object(10))]).await;
        let err = sign_candidates(
            &store,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston - Boston/Foreplay.mp3"]),
            Duration::from_secs(60),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProxyError::NotFound { .. }));

        let err = sign_candidates(
            &store,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston/Foreplay.mp3"]),
            Duration::from_secs(60),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn transient_failure_moves_on_to_next_candidate() {
        let store = memory_store(&[
            ("albums/Boston/Foreplay.mp3", object(10)),
            ("albums/Boston - Boston/Foreplay.mp3", object(20)),
        ])
        .await;
        let source = FlakySource::new(store).with_transient("albums/Boston/Foreplay.mp3");

        let response = stream_candidates(
            &source,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston/Foreplay.mp3", "albums/Boston - Boston/Foreplay.mp3"]),
            Some("bytes=0-4"),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-4/20");

        let response = stream_candidates(
            &source,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston/Foreplay.mp3", "albums/Boston - Boston/Foreplay.mp3"]),
            None,
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "20");
    }

    #[tokio::test]
    async fn transient_failure_on_last_candidate_is_upstream_error() {
        let store = memory_store(&[("albums/Boston/Foreplay.mp3", object(10))]).await;
        let source = FlakySource::new(store).with_transient("albums/Boston/Foreplay.mp3");

        let err = stream_candidates(
            &source,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston - Boston/Foreplay.mp3", "albums/Boston/Foreplay.mp3"]),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProxyError::Upstream { .. }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.requested_key(), "Boston/Boston/Foreplay.mp3");

        // A not-found after the transient one decides the outcome.
        let err = stream_candidates(
            &source,
            "Boston/Boston/Foreplay.mp3",
            &keys(&["albums/Boston/Foreplay.mp3", "albums/Boston - Boston/Foreplay.mp3"]),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProxyError::NotFound { attempted: 2, .. }));
    }
}

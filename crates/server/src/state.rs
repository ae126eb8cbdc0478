use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::mapping_cache::FolderMappingCache;
use crate::store::ObjectSource;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn ObjectSource>,
    pub mapping_cache: Arc<FolderMappingCache>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn ObjectSource>) -> Self {
        let mapping_cache = Arc::new(FolderMappingCache::new(
            Arc::clone(&store),
            config.mapping_ttl(),
        ));
        Self {
            config: Arc::new(config),
            store,
            mapping_cache,
        }
    }
}

#[derive(Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyErrorResponse {
    pub error: String,
    pub requested_key: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct InvalidateResponse {
    pub message: String,
    pub timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatusResponse {
    pub state: &'static str,
    pub entries: usize,
    pub age_secs: Option<u64>,
    pub ttl_secs: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub url: String,
    pub key: String,
    pub expires_in: u64,
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

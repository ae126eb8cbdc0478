use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use common::ALBUMS_PREFIX;
use library::{index_objects, FolderMapping, LibraryIndex};
use tracing::{info, warn};

use crate::state::{AppState, JsonResult};
use crate::utils::json_error;

/// Lists the whole library and groups it by artist and album.
///
/// The same listing rebuilds the folder mapping, so browsing then playing does not
/// list the bucket twice.
pub async fn list_albums(State(state): State<AppState>) -> JsonResult<LibraryIndex> {
    let epoch = state.mapping_cache.epoch();
    let objects = state.store.list_all(ALBUMS_PREFIX).await.map_err(|err| {
        warn!("Album listing failed: {}", err);
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to list albums: {}", err),
        )
    })?;

    let keys: Vec<&str> = objects.iter().map(|entry| entry.key.as_str()).collect();
    let index = index_objects(keys.iter().copied());
    let stats = index.stats();
    info!(
        "Indexed {} objects: {} artists, {} albums, {} tracks, {} images",
        objects.len(),
        stats.artists,
        stats.albums,
        stats.tracks,
        stats.images
    );

    state
        .mapping_cache
        .prime_if(epoch, FolderMapping::from_keys(keys));
    Ok(Json(index))
}

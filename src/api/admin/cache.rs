//! Cache administration endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::infrastructure::cache::StoreStats;

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub deleted: usize,
    pub message: String,
}

/// GET /cache/stats - Key count and memory usage under the key prefix
pub async fn cache_stats(State(state): State<AppState>) -> Result<Json<StoreStats>, ApiError> {
    let stats = state
        .cache_store()
        .stats(state.key_prefix())
        .await
        .map_err(|_| ApiError::unavailable("Cache service unavailable"))?;

    Ok(Json(stats))
}

/// DELETE /cache - Remove every entry under the key prefix
pub async fn clear_cache(
    State(state): State<AppState>,
) -> Result<Json<ClearCacheResponse>, ApiError> {
    let deleted = state
        .cache_store()
        .clear(state.key_prefix())
        .await
        .map_err(|_| ApiError::unavailable("Cache service unavailable"))?;

    info!(deleted, prefix = %state.key_prefix(), "Cache cleared");

    Ok(Json(ClearCacheResponse {
        deleted,
        message: format!("Cleared {} cached entries", deleted),
    }))
}

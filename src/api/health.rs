//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::debug;

use super::state::AppState;

/// Health response with cache store status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub redis_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_stats: Option<CacheSummary>,
}

/// Health check status
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct CacheSummary {
    pub total_keys: usize,
}

/// Reports `degraded` while the cache store is unavailable
///
/// Always answers 200: the proxy keeps serving requests without a cache.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.cache_store();
    let connected = store.ensure_available().await;

    let cache_stats = if connected {
        match store.count(state.key_prefix()).await {
            Ok(total_keys) => Some(CacheSummary { total_keys }),
            Err(e) => {
                debug!(error = %e, "Could not count cache keys");
                None
            }
        }
    } else {
        None
    };

    let status = if store.is_available() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        redis_connected: store.is_available(),
        cache_stats,
    };

    (StatusCode::OK, Json(response))
}

/// Liveness check - the process is up
pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::admin;
use super::health;
use super::middleware::{logging_middleware, metrics_middleware};
use super::proxy;
use super::state::AppState;

/// Create the full router with application state
pub fn create_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/live", get(health::live_check))
        // Proxy endpoints
        .route(
            "/proxy",
            get(proxy::proxy_request)
                .post(proxy::proxy_request)
                .put(proxy::proxy_request)
                .delete(proxy::proxy_request)
                .patch(proxy::proxy_request),
        )
        .route(
            "/webhook-test/post-response",
            post(proxy::legacy_proxy_request),
        )
        // Cache administration
        .merge(admin::create_admin_router())
        // Add state and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

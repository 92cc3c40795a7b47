//! Proxy HTTP Cache
//!
//! A transparent forward proxy that deduplicates identical outbound HTTP
//! requests through a content-addressed cache:
//! - Deterministic cache keys from method, URL, filtered headers and body
//! - Redis or in-process storage with per-request TTL and bypass
//! - Keeps serving, uncached, while the store is unreachable

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use infrastructure::{
    cache::CacheFactory,
    services::{ProxyService, ProxyServiceConfig},
    upstream::HttpUpstream,
};
use tracing::info;

/// Create the application state with custom configuration
///
/// The upstream client and cache store are created once here and shared
/// by every request.
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    config.validate()?;

    let store = Arc::new(CacheFactory::new().create_store(&config.cache).await?);
    let upstream = Arc::new(HttpUpstream::new(config.proxy.client_config())?);

    let service = ProxyService::new(service_config(config), store, upstream);

    info!(
        backend = %config.cache.backend,
        prefix = %config.cache.key_prefix,
        default_ttl_secs = config.cache.default_ttl_secs,
        timeout_secs = config.proxy.timeout_secs,
        "Proxy service initialized"
    );

    Ok(AppState::new(Arc::new(service)))
}

/// Proxy service settings derived from the application configuration
pub fn service_config(config: &AppConfig) -> ProxyServiceConfig {
    ProxyServiceConfig {
        key_prefix: config.cache.key_prefix.clone(),
        key_exclusions: config.proxy.key_exclusions(),
        forward_exclusions: config.proxy.forward_exclusions(),
        default_ttl: config.cache.default_ttl(),
    }
}

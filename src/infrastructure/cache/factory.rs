//! Cache factory for runtime selection

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::cache::Cache;
use crate::domain::DomainError;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig};
use super::resilient::{ResilientCache, ResilientCacheConfig};

/// Supported cache backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    /// In-process cache using moka
    #[serde(alias = "memory", alias = "inmemory")]
    InMemory,
    /// Shared Redis store
    #[default]
    Redis,
    /// Caching disabled, every request goes upstream
    #[serde(alias = "disabled")]
    None,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::InMemory => write!(f, "in_memory"),
            CacheType::Redis => write!(f, "redis"),
            CacheType::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for CacheType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheType::InMemory),
            "redis" => Ok(CacheType::Redis),
            "none" | "disabled" => Ok(CacheType::None),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache type: {}. Valid types: in_memory, redis, none",
                s
            ))),
        }
    }
}

/// `[cache]` configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheType,
    pub redis_url: String,
    /// Namespace for every cache key
    pub key_prefix: String,
    /// TTL applied when a request does not override it; `0` never expires
    pub default_ttl_secs: u64,
    pub connection_timeout_secs: u64,
    /// Delay between reconnection attempts while the store is down
    pub probe_interval_secs: u64,
    /// Entry limit for the in-memory backend
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheType::Redis,
            redis_url: RedisCacheConfig::default().url,
            key_prefix: "proxy:cache:".to_string(),
            default_ttl_secs: 3600,
            connection_timeout_secs: 5,
            probe_interval_secs: 5,
            max_capacity: InMemoryCacheConfig::default().max_capacity,
        }
    }
}

impl CacheConfig {
    /// Configuration for the in-memory backend
    pub fn in_memory() -> Self {
        Self {
            backend: CacheType::InMemory,
            ..Default::default()
        }
    }

    /// Configuration for a Redis backend
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            backend: CacheType::Redis,
            redis_url: url.into(),
            ..Default::default()
        }
    }

    /// Default TTL as a store expiry, `None` when entries never expire
    pub fn default_ttl(&self) -> Option<Duration> {
        (self.default_ttl_secs > 0).then(|| Duration::from_secs(self.default_ttl_secs))
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.key_prefix.is_empty() {
            return Err(DomainError::configuration("cache.key_prefix must not be empty"));
        }

        if self.backend == CacheType::Redis && self.redis_url.trim().is_empty() {
            return Err(DomainError::configuration(
                "cache.redis_url is required for the redis backend",
            ));
        }

        Ok(())
    }

    fn resilience(&self) -> ResilientCacheConfig {
        ResilientCacheConfig {
            probe_interval: Duration::from_secs(self.probe_interval_secs.max(1)),
            operation_timeout: Duration::from_secs(self.connection_timeout_secs.max(1)),
        }
    }
}

/// Factory for creating cache instances
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    pub fn new() -> Self {
        Self
    }

    /// Creates the configured backend, `None` when caching is disabled
    pub fn create(&self, config: &CacheConfig) -> Result<Option<Arc<dyn Cache>>, DomainError> {
        match config.backend {
            CacheType::InMemory => {
                let in_memory_config =
                    InMemoryCacheConfig::default().with_max_capacity(config.max_capacity);

                Ok(Some(Arc::new(InMemoryCache::with_config(in_memory_config))))
            }
            CacheType::Redis => {
                let redis_config = RedisCacheConfig::new(config.redis_url.clone())
                    .with_connection_timeout(Duration::from_secs(
                        config.connection_timeout_secs.max(1),
                    ));

                Ok(Some(Arc::new(RedisCache::new(redis_config)?)))
            }
            CacheType::None => Ok(None),
        }
    }

    /// Creates the store used by the proxy and probes it once
    ///
    /// An unreachable backend is not an error: the store starts in degraded
    /// mode and reconnects on its own.
    pub async fn create_store(&self, config: &CacheConfig) -> Result<ResilientCache, DomainError> {
        let Some(backend) = self.create(config)? else {
            info!("Caching disabled, all requests go upstream");
            return Ok(ResilientCache::disabled());
        };

        let store = ResilientCache::new(backend, config.resilience());

        if store.probe().await {
            info!(backend = %config.backend, "Cache store ready");
        } else {
            warn!(backend = %config.backend, "Cache store unreachable at startup, running without cache");
        }

        Ok(store)
    }
}

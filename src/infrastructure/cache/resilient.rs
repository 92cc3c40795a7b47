//! Store adapter that turns backend failures into degraded mode
//!
//! Every operation updates the availability flag: success marks the store
//! available, failure marks it unavailable. While unavailable, reads and
//! writes are skipped and a ping is attempted at most once per probe
//! interval, so a store that recovers is used again without a restart.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::cache::{abbreviate_key, Cache, CacheExt, CachedEntry};
use crate::domain::DomainError;

/// Tuning for availability checks
#[derive(Debug, Clone)]
pub struct ResilientCacheConfig {
    /// Minimum delay between probes while the store is unavailable
    pub probe_interval: Duration,
    /// Upper bound on any single store operation
    pub operation_timeout: Duration,
}

impl Default for ResilientCacheConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(5),
        }
    }
}

/// Snapshot of store statistics under a key prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_keys: usize,
    pub memory_usage: Option<String>,
    pub prefix: String,
}

/// Optional cache backend with availability tracking
#[derive(Debug)]
pub struct ResilientCache {
    backend: Option<Arc<dyn Cache>>,
    available: AtomicBool,
    last_probe: Mutex<Option<Instant>>,
    config: ResilientCacheConfig,
}

impl ResilientCache {
    /// Wraps a backend. It starts unavailable until the first probe succeeds.
    pub fn new(backend: Arc<dyn Cache>, config: ResilientCacheConfig) -> Self {
        Self {
            backend: Some(backend),
            available: AtomicBool::new(false),
            last_probe: Mutex::new(None),
            config,
        }
    }

    /// A store that is permanently absent
    pub fn disabled() -> Self {
        Self {
            backend: None,
            available: AtomicBool::new(false),
            last_probe: Mutex::new(None),
            config: ResilientCacheConfig::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Last known availability, without touching the backend
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Pings the backend and records the outcome
    pub async fn probe(&self) -> bool {
        let Some(backend) = self.backend.clone() else {
            return false;
        };

        if let Ok(mut last) = self.last_probe.lock() {
            *last = Some(Instant::now());
        }

        self.run("ping", backend.ping()).await.is_ok()
    }

    /// Whether the store can be used now, probing if a retry is due
    pub async fn ensure_available(&self) -> bool {
        if self.is_available() {
            return true;
        }

        if self.backend.is_none() || !self.probe_due() {
            return false;
        }

        self.probe().await
    }

    fn probe_due(&self) -> bool {
        match self.last_probe.lock() {
            Ok(last) => (*last).is_none_or(|at| at.elapsed() >= self.config.probe_interval),
            Err(_) => true,
        }
    }

    /// Looks up an entry; any failure reads as a miss
    pub async fn get_entry(&self, key: &str) -> Option<CachedEntry> {
        let backend = self.usable_backend().await?;
        let raw = self.run("get", backend.get_raw(key)).await.ok()??;

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key = %abbreviate_key(key), error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    /// Stores an entry; returns whether the write happened
    pub async fn put_entry(&self, key: &str, entry: &CachedEntry, ttl: Option<Duration>) -> bool {
        let Some(backend) = self.usable_backend().await else {
            return false;
        };

        self.run("set", backend.set(key, entry, ttl)).await.is_ok()
    }

    /// Removes a single entry
    pub async fn delete(&self, key: &str) -> bool {
        let Some(backend) = self.usable_backend().await else {
            return false;
        };

        self.run("delete", backend.delete(key)).await.unwrap_or(false)
    }

    /// Counts entries under a prefix
    pub async fn count(&self, prefix: &str) -> Result<usize, DomainError> {
        let backend = self.require_backend().await?;
        self.run("count", backend.count_pattern(&format!("{}*", prefix)))
            .await
    }

    /// Key count and memory usage under a prefix
    pub async fn stats(&self, prefix: &str) -> Result<StoreStats, DomainError> {
        let backend = self.require_backend().await?;
        let total_keys = self
            .run("count", backend.count_pattern(&format!("{}*", prefix)))
            .await?;
        let memory_usage = self.run("memory", backend.memory_usage()).await?;

        Ok(StoreStats {
            total_keys,
            memory_usage,
            prefix: prefix.to_string(),
        })
    }

    /// Deletes every entry under a prefix, returning how many were removed
    pub async fn clear(&self, prefix: &str) -> Result<usize, DomainError> {
        let backend = self.require_backend().await?;
        self.run("clear", backend.delete_pattern(&format!("{}*", prefix)))
            .await
    }

    async fn usable_backend(&self) -> Option<Arc<dyn Cache>> {
        if self.ensure_available().await {
            self.backend.clone()
        } else {
            None
        }
    }

    async fn require_backend(&self) -> Result<Arc<dyn Cache>, DomainError> {
        self.usable_backend()
            .await
            .ok_or_else(|| DomainError::cache("Cache store unavailable"))
    }

    /// Runs a backend operation under the timeout and updates availability
    async fn run<T, F>(&self, operation: &str, future: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        let result = match tokio::time::timeout(self.config.operation_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::cache(format!(
                "Cache {} timed out after {:?}",
                operation, self.config.operation_timeout
            ))),
        };

        match &result {
            Ok(_) => self.mark_available(),
            Err(e) => self.mark_unavailable(operation, e),
        }

        result
    }

    fn mark_available(&self) {
        if !self.available.swap(true, Ordering::SeqCst) {
            info!("Cache store available, caching enabled");
        }
    }

    fn mark_unavailable(&self, operation: &str, error: &DomainError) {
        if self.available.swap(false, Ordering::SeqCst) {
            warn!(operation, error = %error, "Cache store unavailable, running without cache");
        } else {
            debug!(operation, error = %error, "Cache store still unavailable");
        }

        if let Ok(mut last) = self.last_probe.lock() {
            *last = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CachedBody, MockCache};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn entry() -> CachedEntry {
        CachedEntry {
            status_code: 200,
            headers: BTreeMap::new(),
            content_type: "text/plain".to_string(),
            body: CachedBody::Text("hello".to_string()),
            cached_at: Utc::now(),
        }
    }

    fn store(backend: Arc<MockCache>, probe_interval: Duration) -> ResilientCache {
        ResilientCache::new(
            backend,
            ResilientCacheConfig {
                probe_interval,
                operation_timeout: Duration::from_secs(1),
            },
        )
    }

    #[tokio::test]
    async fn test_first_use_probes_backend() {
        let store = store(Arc::new(MockCache::new()), Duration::from_secs(60));
        assert!(!store.is_available());

        let stored = entry();
        assert!(store.put_entry("k", &stored, None).await);
        assert!(store.is_available());
        assert_eq!(store.get_entry("k").await, Some(stored));
    }

    #[tokio::test]
    async fn test_failure_degrades_and_swallows_errors() {
        let backend = Arc::new(MockCache::new());
        let store = store(backend.clone(), Duration::from_secs(60));
        assert!(store.probe().await);

        backend.set_failing(true);

        assert_eq!(store.get_entry("k").await, None);
        assert!(!store.is_available());
        assert!(!store.put_entry("k", &entry(), None).await);
        assert!(store.count("proxy:cache:").await.is_err());
    }

    #[tokio::test]
    async fn test_recovers_after_probe_interval() {
        let backend = Arc::new(MockCache::failing());
        let store = store(backend.clone(), Duration::from_millis(20));

        assert!(!store.probe().await);
        backend.set_failing(false);

        // Probe not yet due
        assert!(!store.ensure_available().await);

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.ensure_available().await);
        assert!(store.put_entry("k", &entry(), None).await);
        assert!(backend.contains("k"));
    }

    #[tokio::test]
    async fn test_disabled_store_is_never_available() {
        let store = ResilientCache::disabled();

        assert!(!store.is_configured());
        assert!(!store.probe().await);
        assert!(!store.put_entry("k", &entry(), None).await);
        assert_eq!(store.get_entry("k").await, None);
        assert!(store.clear("proxy:cache:").await.is_err());
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_a_miss_not_an_outage() {
        let backend = Arc::new(MockCache::new());
        backend.set_raw("k", "{not json", None).await.unwrap();
        let store = store(backend, Duration::from_secs(60));

        assert_eq!(store.get_entry("k").await, None);
        assert!(store.is_available());
    }

    #[tokio::test]
    async fn test_stats_and_clear_under_prefix() {
        let backend = Arc::new(MockCache::new());
        let store = store(backend.clone(), Duration::from_secs(60));

        store.put_entry("proxy:cache:a", &entry(), None).await;
        store.put_entry("proxy:cache:b", &entry(), None).await;
        backend.set_raw("other:c", "{}", None).await.unwrap();

        let stats = store.stats("proxy:cache:").await.unwrap();
        assert_eq!(stats.total_keys, 2);
        assert_eq!(stats.prefix, "proxy:cache:");

        assert_eq!(store.clear("proxy:cache:").await.unwrap(), 2);
        assert_eq!(store.count("proxy:cache:").await.unwrap(), 0);
        assert!(backend.contains("other:c"));
    }

    #[tokio::test]
    async fn test_delete_single_entry() {
        let backend = Arc::new(MockCache::new());
        let store = store(backend.clone(), Duration::from_secs(60));

        store.put_entry("k", &entry(), Some(Duration::from_secs(5))).await;
        assert_eq!(backend.ttl_of("k"), Some(Some(Duration::from_secs(5))));

        assert!(store.delete("k").await);
        assert!(!backend.contains("k"));
    }
}

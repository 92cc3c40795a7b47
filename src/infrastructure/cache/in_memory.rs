//! In-memory cache implementation using moka

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::{glob_to_regex, Cache};
use crate::domain::DomainError;

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl InMemoryCacheConfig {
    /// Sets the maximum number of entries
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    data: String,
    /// Expiration timestamp (millis since epoch), `None` never expires
    expires_at: Option<u64>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| InMemoryCache::current_time_millis() >= at)
    }
}

/// Thread-safe in-memory cache implementation using moka
///
/// Entries carry their own expiry, checked on read. Capacity overflow
/// evicts using moka's TinyLFU policy.
#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
}

impl InMemoryCache {
    /// Creates a new in-memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    /// Creates a new in-memory cache with the given configuration
    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .build();

        Self { cache }
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Live entries whose key matches the pattern
    async fn matching(&self, pattern: &str) -> Result<Vec<(String, usize)>, DomainError> {
        let regex = glob_to_regex(pattern)?;

        self.cache.run_pending_tasks().await;

        let cache_clone = self.cache.clone();
        tokio::task::spawn_blocking(move || {
            cache_clone
                .iter()
                .filter(|(_, entry)| !entry.is_expired())
                .filter_map(|(k, entry)| {
                    let key_str: &str = k.as_ref();

                    if regex.is_match(key_str) {
                        Some((key_str.to_string(), key_str.len() + entry.data.len()))
                    } else {
                        None
                    }
                })
                .collect()
        })
        .await
        .map_err(|e| DomainError::cache(format!("Failed to iterate cache: {}", e)))
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.cache.get(key).await {
            Some(entry) => {
                if entry.is_expired() {
                    self.cache.remove(key).await;
                    return Ok(None);
                }

                Ok(Some(entry.data))
            }
            None => Ok(None),
        }
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let entry = CacheEntry {
            data: value.to_string(),
            expires_at: ttl.map(|ttl| Self::current_time_millis() + ttl.as_millis() as u64),
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self
            .cache
            .remove(key)
            .await
            .is_some_and(|entry| !entry.is_expired()))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize, DomainError> {
        let keys_to_delete = self.matching(pattern).await?;
        let mut deleted = 0;

        for (key, _) in keys_to_delete {
            if self.cache.remove(&key).await.is_some() {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn count_pattern(&self, pattern: &str) -> Result<usize, DomainError> {
        Ok(self.matching(pattern).await?.len())
    }

    async fn memory_usage(&self) -> Result<Option<String>, DomainError> {
        let bytes: usize = self.matching("*").await?.iter().map(|(_, size)| size).sum();
        Ok(Some(human_bytes(bytes as u64)))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Formats a byte count the way Redis reports `used_memory_human`
fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["K", "M", "G", "T"];

    if bytes < 1024 {
        return format!("{}B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = "B";

    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }

    format!("{:.2}{}", value, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = InMemoryCache::new();

        let result: Option<String> = cache.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = InMemoryCache::new();

        cache.set("key1", &"value1", None).await.unwrap();

        assert!(cache.delete("key1").await.unwrap());
        assert!(!cache.delete("key1").await.unwrap());

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Some(Duration::from_millis(50)))
            .await
            .unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert!(result.is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let cache = InMemoryCache::new();

        cache.set("forever", &"value", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result: Option<String> = cache.get("forever").await.unwrap();
        assert_eq!(result, Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_pattern_count_and_delete() {
        let cache = InMemoryCache::new();

        cache.set("proxy:cache:1", &"a", None).await.unwrap();
        cache.set("proxy:cache:2", &"b", None).await.unwrap();
        cache.set("other:key", &"c", None).await.unwrap();

        assert_eq!(cache.count_pattern("proxy:cache:*").await.unwrap(), 2);
        assert_eq!(cache.delete_pattern("proxy:cache:*").await.unwrap(), 2);
        assert_eq!(cache.count_pattern("proxy:cache:*").await.unwrap(), 0);
        assert_eq!(cache.count_pattern("*").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_not_counted() {
        let cache = InMemoryCache::new();

        cache
            .set("proxy:cache:short", &"a", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        cache.set("proxy:cache:long", &"b", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.count_pattern("proxy:cache:*").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_usage_reports_bytes() {
        let cache = InMemoryCache::new();
        cache.set_raw("k", "value", None).await.unwrap();

        assert_eq!(cache.memory_usage().await.unwrap(), Some("6B".to_string()));
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512B");
        assert_eq!(human_bytes(2048), "2.00K");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.00M");
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let cache = InMemoryCache::with_config(InMemoryCacheConfig::default().with_max_capacity(10));

        for i in 0..100 {
            cache.set_raw(&format!("k{}", i), "v", None).await.unwrap();
        }
        cache.cache.run_pending_tasks().await;

        assert!(cache.cache.entry_count() <= 10);
    }
}

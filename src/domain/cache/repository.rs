//! Cache trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// Key-value store with optional per-key expiry
///
/// Values are strings so the trait stays dyn-compatible; use [`CacheExt`]
/// for typed access. Patterns are globs where `*` matches any run of
/// characters, e.g. `proxy:cache:*`.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Gets a raw value from the cache
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Sets a raw value. `None` stores the value without expiry.
    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError>;

    /// Deletes a value from the cache
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Deletes all keys matching a pattern, returning how many were removed
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, DomainError>;

    /// Counts keys matching a pattern
    async fn count_pattern(&self, pattern: &str) -> Result<usize, DomainError>;

    /// Human-readable storage usage, if the backend reports one
    async fn memory_usage(&self) -> Result<Option<String>, DomainError>;

    /// Round-trip check against the backend
    async fn ping(&self) -> Result<(), DomainError>;
}

/// Extension trait providing typed get/set operations
pub trait CacheExt: Cache {
    /// Gets a typed value from the cache
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::cache(format!("Failed to deserialize cache value: {}", e))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Sets a typed value in the cache
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::cache(format!("Failed to serialize cache value: {}", e))
            })?;
            self.set_raw(key, &data, ttl).await
        }
    }
}

// Blanket implementation for all types implementing Cache
impl<T: Cache + ?Sized> CacheExt for T {}

/// Converts a `*` glob into an anchored regex
pub(crate) fn glob_to_regex(pattern: &str) -> Result<regex::Regex, DomainError> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");

    regex::Regex::new(&format!("^{}$", escaped))
        .map_err(|e| DomainError::cache(format!("Invalid pattern: {}", e)))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_to_regex_escapes_literals() {
        let regex = glob_to_regex("proxy:cache.v1:*").unwrap();

        assert!(regex.is_match("proxy:cache.v1:abc"));
        assert!(!regex.is_match("proxy:cacheXv1:abc"));
        assert!(!regex.is_match("other:proxy:cache.v1:abc"));
    }
}

//! Cache-through proxy service

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::domain::cache::{abbreviate_key, CacheKeyDeriver, CachedEntry, HeaderExclusions};
use crate::domain::proxy::{ProxyEnvelope, ProxyRequest};
use crate::domain::upstream::{UpstreamExecutor, UpstreamRequest, UpstreamResponse};
use crate::domain::DomainError;
use crate::infrastructure::cache::ResilientCache;
use crate::infrastructure::observability::{
    record_cache_outcome, record_cache_write, record_upstream_call, record_upstream_error,
    CacheOutcome,
};

/// Configuration for the proxy service
#[derive(Debug, Clone)]
pub struct ProxyServiceConfig {
    /// Namespace prefix for cache keys
    pub key_prefix: String,
    /// Headers left out of the cache key
    pub key_exclusions: HeaderExclusions,
    /// Headers never forwarded upstream
    pub forward_exclusions: HeaderExclusions,
    /// TTL when the request does not set one; `None` never expires
    pub default_ttl: Option<Duration>,
}

impl Default for ProxyServiceConfig {
    fn default() -> Self {
        Self {
            key_prefix: "proxy:cache:".to_string(),
            key_exclusions: HeaderExclusions::default_for_key(),
            forward_exclusions: HeaderExclusions::default_for_forwarding(),
            default_ttl: Some(Duration::from_secs(3600)),
        }
    }
}

/// Serves requests from the cache when possible and forwards them otherwise
///
/// Store failures never reach the caller: lookups degrade to misses and
/// writes are skipped. Only upstream failures are returned as errors.
#[derive(Debug)]
pub struct ProxyService {
    deriver: CacheKeyDeriver,
    forward_exclusions: HeaderExclusions,
    default_ttl: Option<Duration>,
    store: Arc<ResilientCache>,
    upstream: Arc<dyn UpstreamExecutor>,
}

impl ProxyService {
    pub fn new(
        config: ProxyServiceConfig,
        store: Arc<ResilientCache>,
        upstream: Arc<dyn UpstreamExecutor>,
    ) -> Self {
        Self {
            deriver: CacheKeyDeriver::new(config.key_prefix, config.key_exclusions),
            forward_exclusions: config.forward_exclusions,
            default_ttl: config.default_ttl,
            store,
            upstream,
        }
    }

    pub fn key_prefix(&self) -> &str {
        self.deriver.prefix()
    }

    pub fn store(&self) -> &Arc<ResilientCache> {
        &self.store
    }

    /// Derives the cache key a request would use
    pub fn cache_key(&self, request: &ProxyRequest) -> String {
        self.deriver.derive(
            &request.method,
            &request.url,
            &request.headers,
            &request.body,
        )
    }

    /// Runs one request through lookup, forward and store
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyEnvelope, DomainError> {
        let cache_key = self.cache_key(&request);
        let short_key = abbreviate_key(&cache_key).to_string();

        if request.bypass {
            record_cache_outcome(CacheOutcome::Bypass);
            debug!(key = %short_key, url = %request.url, "Cache bypass requested");
        } else if let Some(entry) = self.store.get_entry(&cache_key).await {
            record_cache_outcome(CacheOutcome::Hit);
            info!(key = %short_key, url = %request.url, status = entry.status_code, "Cache hit");

            return Ok(envelope(&entry, cache_key, true));
        } else {
            record_cache_outcome(CacheOutcome::Miss);
            info!(key = %short_key, url = %request.url, "Cache miss");
        }

        let response = self.forward(&request).await?;
        let entry = CachedEntry::from_response(&response);

        if response.is_cacheable() {
            let ttl = self.ttl_for(request.ttl_override);

            if self.store.put_entry(&cache_key, &entry, ttl).await {
                record_cache_write();
                debug!(key = %short_key, ttl_secs = ?ttl.map(|t| t.as_secs()), "Response cached");
            }
        } else {
            debug!(key = %short_key, status = response.status_code, "Error status not cached");
        }

        Ok(envelope(&entry, cache_key, false))
    }

    async fn forward(&self, request: &ProxyRequest) -> Result<UpstreamResponse, DomainError> {
        let upstream_request = UpstreamRequest {
            method: request.method.trim().to_ascii_uppercase(),
            url: request.url.clone(),
            headers: self.forward_exclusions.filter(&request.headers),
            body: request.body.clone(),
        };

        let started = Instant::now();

        match self.upstream.send(upstream_request).await {
            Ok(response) => {
                record_upstream_call(response.status_code, started.elapsed());
                debug!(
                    url = %request.url,
                    status = response.status_code,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Upstream responded"
                );
                Ok(response)
            }
            Err(e) if e.is_upstream() => {
                let kind = match &e {
                    DomainError::UpstreamTimeout { .. } => "timeout",
                    DomainError::UpstreamUnreachable { .. } => "unreachable",
                    _ => "other",
                };
                record_upstream_error(kind);
                warn!(url = %request.url, kind, error = %e, "Upstream request failed");
                Err(e)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Request rejected before forwarding");
                Err(e)
            }
        }
    }

    fn ttl_for(&self, ttl_override: Option<u64>) -> Option<Duration> {
        match ttl_override {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => self.default_ttl,
        }
    }
}

fn envelope(entry: &CachedEntry, cache_key: String, cached: bool) -> ProxyEnvelope {
    ProxyEnvelope {
        success: entry.status_code < 400,
        cached,
        cache_key,
        status_code: entry.status_code,
        data: entry.data(),
    }
}

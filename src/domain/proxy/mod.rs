//! Proxy domain - inbound request and response envelope

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound request to be served through the cache
#[derive(Debug, Clone, Default)]
pub struct ProxyRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Per-request TTL in seconds for this write only; `0` means no expiry
    pub ttl_override: Option<u64>,
    /// Skip the lookup and force a fresh upstream call
    pub bypass: bool,
}

impl ProxyRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_override = Some(ttl_secs);
        self
    }

    pub fn bypassing_cache(mut self) -> Self {
        self.bypass = true;
        self
    }
}

/// Unified response returned for every proxied call, hit or miss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyEnvelope {
    pub success: bool,
    pub cached: bool,
    pub cache_key: String,
    pub status_code: u16,
    pub data: Value,
}

//! Upstream executor - the outbound HTTP call behind a cache miss

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::DomainError;

/// Request forwarded to the upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Response received from the upstream, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the response may be stored (status below 400)
    pub fn is_cacheable(&self) -> bool {
        self.status_code < 400
    }
}

/// Executes forwarded HTTP calls
///
/// Implementations must be safe to share across concurrent requests, bound
/// each call with a timeout and never retry. Connect failures map to
/// [`DomainError::UpstreamUnreachable`], timeouts to
/// [`DomainError::UpstreamTimeout`].
#[async_trait]
pub trait UpstreamExecutor: Send + Sync + std::fmt::Debug {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, DomainError>;
}

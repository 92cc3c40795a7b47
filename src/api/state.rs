//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::cache::ResilientCache;
use crate::infrastructure::services::ProxyService;

/// Long-lived handles shared by every request
#[derive(Debug, Clone)]
pub struct AppState {
    pub proxy_service: Arc<ProxyService>,
}

impl AppState {
    pub fn new(proxy_service: Arc<ProxyService>) -> Self {
        Self { proxy_service }
    }

    pub fn cache_store(&self) -> &Arc<ResilientCache> {
        self.proxy_service.store()
    }

    pub fn key_prefix(&self) -> &str {
        self.proxy_service.key_prefix()
    }
}

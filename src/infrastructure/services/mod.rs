//! Application services

mod proxy_service;

pub use proxy_service::{ProxyService, ProxyServiceConfig};

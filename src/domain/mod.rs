//! Domain layer - Core business logic and entities

pub mod cache;
pub mod error;
pub mod proxy;
pub mod upstream;

pub use cache::{
    Cache, CacheExt, CacheKeyDeriver, CachedBody, CachedEntry, HeaderExclusions,
    RequestSignature,
};
pub use error::DomainError;
pub use proxy::{ProxyEnvelope, ProxyRequest};
pub use upstream::{UpstreamExecutor, UpstreamRequest, UpstreamResponse};

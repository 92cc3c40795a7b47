//! Cache infrastructure - store backends and degraded-mode wrapper

mod factory;
mod in_memory;
mod redis;
mod resilient;

pub use factory::{CacheConfig, CacheFactory, CacheType};
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use redis::{RedisCache, RedisCacheConfig};
pub use resilient::{ResilientCache, ResilientCacheConfig, StoreStats};

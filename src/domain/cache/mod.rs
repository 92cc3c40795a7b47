//! Cache domain - key derivation, stored entries and the store abstraction

mod entry;
mod key;
mod repository;

pub use entry::{CachedBody, CachedEntry, DEFAULT_CONTENT_TYPE, REPLAY_HEADERS};
pub use key::{
    abbreviate_key, CacheKeyDeriver, HeaderExclusions, RequestSignature,
    DEFAULT_EXCLUDED_HEADERS, DEFAULT_VOLATILE_HEADERS,
};
pub(crate) use repository::glob_to_regex;
pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;

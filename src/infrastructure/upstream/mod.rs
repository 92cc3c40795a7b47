//! Upstream infrastructure - outbound HTTP client

mod http_client;

pub use http_client::{HttpUpstream, UpstreamClientConfig};

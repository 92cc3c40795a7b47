//! Cache key derivation from request signatures
//!
//! A key is `<prefix><sha256 hex>` where the digest covers the uppercased
//! method, the literal URL, the filtered and sorted headers and a digest of
//! the body. Query strings are hashed verbatim, so `?a=1&b=2` and `?b=2&a=1`
//! are different keys.
//!
//! The default exclusion set drops `authorization` from the signature. Two
//! callers that differ only in their bearer token therefore share cache
//! entries. Only run the proxy for trusted, internal clients.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Connection-management headers, stripped before hashing and before forwarding
pub const DEFAULT_EXCLUDED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "accept-encoding",
    "transfer-encoding",
];

/// Per-call identity and tracing headers, stripped before hashing only
pub const DEFAULT_VOLATILE_HEADERS: &[&str] = &[
    "x-request-id",
    "x-correlation-id",
    "date",
    "authorization",
    "x-forwarded-for",
    "x-real-ip",
    "cf-ray",
    "cf-connecting-ip",
];

/// Case-insensitive set of header names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderExclusions {
    names: BTreeSet<String>,
}

impl HeaderExclusions {
    /// Creates an exclusion set from header names (lowercased on insert)
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_ascii_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// Hop-by-hop headers that are never forwarded
    pub fn default_for_forwarding() -> Self {
        Self::new(DEFAULT_EXCLUDED_HEADERS)
    }

    /// Hop-by-hop plus volatile headers, left out of cache keys
    pub fn default_for_key() -> Self {
        Self::new(DEFAULT_EXCLUDED_HEADERS.iter().chain(DEFAULT_VOLATILE_HEADERS))
    }

    /// Returns a new set containing the names of both sets
    pub fn union(&self, other: &HeaderExclusions) -> Self {
        Self {
            names: self.names.union(&other.names).cloned().collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_ascii_lowercase())
    }

    /// Drops excluded headers, preserving order and original name casing
    pub fn filter(&self, headers: &[(String, String)]) -> Vec<(String, String)> {
        headers
            .iter()
            .filter(|(name, _)| !self.contains(name))
            .cloned()
            .collect()
    }
}

/// Normalized identity of a request. Field order is the serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSignature {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body_digest: String,
}

impl RequestSignature {
    /// Canonical JSON encoding used as hash input
    pub fn canonical(&self) -> String {
        // Struct fields and BTreeMap entries serialize in a fixed order
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Derives deterministic cache keys from request components
#[derive(Debug, Clone)]
pub struct CacheKeyDeriver {
    prefix: String,
    exclusions: HeaderExclusions,
}

impl CacheKeyDeriver {
    pub fn new(prefix: impl Into<String>, exclusions: HeaderExclusions) -> Self {
        Self {
            prefix: prefix.into(),
            exclusions,
        }
    }

    /// Namespace prefix prepended to every key
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Builds the normalized signature for a request
    pub fn signature(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> RequestSignature {
        let mut grouped: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();

        for (name, value) in headers {
            let name = name.trim().to_ascii_lowercase();

            if self.exclusions.contains(&name) {
                continue;
            }

            grouped.entry(name).or_default().insert(value.trim());
        }

        // Repeated names merge as a sorted, de-duplicated list
        let headers = grouped
            .into_iter()
            .map(|(name, values)| (name, values.into_iter().collect::<Vec<_>>().join(", ")))
            .collect();

        RequestSignature {
            method: method.trim().to_ascii_uppercase(),
            url: url.to_string(),
            headers,
            body_digest: hex::encode(Sha256::digest(body)),
        }
    }

    /// Derives the prefixed cache key for a request
    pub fn derive(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> String {
        let signature = self.signature(method, url, headers, body);
        let digest = Sha256::digest(signature.canonical().as_bytes());

        format!("{}{}", self.prefix, hex::encode(digest))
    }
}

/// Last 12 characters of a key, for log lines
pub fn abbreviate_key(key: &str) -> &str {
    let start = key.len().saturating_sub(12);
    key.get(start..).unwrap_or(key)
}

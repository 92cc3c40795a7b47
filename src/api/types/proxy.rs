//! Proxy endpoint request types

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use reqwest::Url;
use serde::Deserialize;

use super::error::ApiError;
use crate::domain::ProxyRequest;

/// Query parameters accepted by `/proxy`
///
/// Every field is read as a string so that malformed values produce API
/// errors instead of plain-text extractor rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
    pub bypass_cache: Option<String>,
    pub cache_ttl: Option<String>,
}

impl ProxyQuery {
    /// Validated upstream URL
    pub fn target_url(&self) -> Result<String, ApiError> {
        let raw = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ApiError::bad_request("Missing 'url' query parameter").with_param("url")
            })?;

        let parsed = Url::parse(raw).map_err(|e| {
            ApiError::bad_request(format!("Invalid 'url' query parameter: {}", e)).with_param("url")
        })?;

        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ApiError::bad_request(
                "The 'url' query parameter must be an absolute http or https URL",
            )
            .with_param("url"));
        }

        // Hashed and forwarded exactly as given
        Ok(raw.to_string())
    }

    pub fn bypass(&self) -> Result<bool, ApiError> {
        match self.bypass_cache.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(false),
            Some(v) => match v.as_str() {
                "" | "false" | "0" | "no" | "off" => Ok(false),
                "true" | "1" | "yes" | "on" => Ok(true),
                _ => Err(ApiError::bad_request(format!(
                    "Invalid 'bypass_cache' value '{}', expected a boolean",
                    v
                ))
                .with_param("bypass_cache")),
            },
        }
    }

    pub fn ttl(&self) -> Result<Option<u64>, ApiError> {
        match self.cache_ttl.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) => v.parse::<u64>().map(Some).map_err(|_| {
                ApiError::bad_request(format!(
                    "Invalid 'cache_ttl' value '{}', expected a non-negative integer",
                    v
                ))
                .with_param("cache_ttl")
            }),
        }
    }

    /// Builds the domain request from this query and the inbound parts
    pub fn into_request(
        self,
        method: &Method,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<ProxyRequest, ApiError> {
        let url = self.target_url()?;
        let bypass = self.bypass()?;
        let ttl_override = self.ttl()?;

        Ok(ProxyRequest {
            method: method.as_str().to_string(),
            url,
            headers: header_pairs(headers),
            body,
            ttl_override,
            bypass,
        })
    }
}

/// Header pairs in arrival order, skipping values that are not valid UTF-8
pub fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn query(url: Option<&str>) -> ProxyQuery {
        ProxyQuery {
            url: url.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_or_empty_url_is_rejected() {
        for q in [query(None), query(Some("")), query(Some("   "))] {
            let err = q.target_url().unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert_eq!(err.response.error.param.as_deref(), Some("url"));
        }
    }

    #[test]
    fn test_malformed_url_is_rejected() {
        assert!(query(Some("not a url")).target_url().is_err());
        assert!(query(Some("ftp://files.local/x")).target_url().is_err());
        assert!(query(Some("/relative/path")).target_url().is_err());
    }

    #[test]
    fn test_url_is_kept_literally() {
        let url = "https://api.example.com/x?b=2&a=1";
        assert_eq!(query(Some(url)).target_url().unwrap(), url);
    }

    #[test]
    fn test_bypass_parsing() {
        let mut q = query(Some("https://x.io"));
        assert!(!q.bypass().unwrap());

        q.bypass_cache = Some("true".to_string());
        assert!(q.bypass().unwrap());

        q.bypass_cache = Some("1".to_string());
        assert!(q.bypass().unwrap());

        q.bypass_cache = Some("False".to_string());
        assert!(!q.bypass().unwrap());

        q.bypass_cache = Some("maybe".to_string());
        assert!(q.bypass().is_err());
    }

    #[test]
    fn test_ttl_parsing() {
        let mut q = query(Some("https://x.io"));
        assert_eq!(q.ttl().unwrap(), None);

        q.cache_ttl = Some("60".to_string());
        assert_eq!(q.ttl().unwrap(), Some(60));

        q.cache_ttl = Some("0".to_string());
        assert_eq!(q.ttl().unwrap(), Some(0));

        q.cache_ttl = Some("-5".to_string());
        assert!(q.ttl().is_err());
    }

    #[test]
    fn test_into_request() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let q = ProxyQuery {
            url: Some("https://api.example.com/items".to_string()),
            bypass_cache: Some("true".to_string()),
            cache_ttl: Some("30".to_string()),
        };

        let request = q
            .into_request(&Method::POST, &headers, Bytes::from_static(b"{}"))
            .unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://api.example.com/items");
        assert!(request.bypass);
        assert_eq!(request.ttl_override, Some(30));
        assert_eq!(
            request.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
    }
}

//! Cached response entries

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::upstream::UpstreamResponse;

/// Content type assumed when the upstream sends none
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Upstream response headers stored alongside the body
pub const REPLAY_HEADERS: &[&str] = &[
    "content-type",
    "x-request-id",
    "x-correlation-id",
    "x-ratelimit-remaining",
];

/// Response body as persisted. The variant is chosen once, at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "payload", rename_all = "snake_case")]
pub enum CachedBody {
    Empty,
    Text(String),
    /// Base64 (standard alphabet) of the raw bytes
    Binary(String),
}

impl CachedBody {
    /// Chooses a representation for a response body
    ///
    /// Textual content types with valid UTF-8 are kept as text. Without a
    /// content type, the payload itself decides.
    pub fn from_bytes(content_type: Option<&str>, body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::Empty;
        }

        let textual = match content_type {
            Some(ct) => is_textual_content_type(ct),
            None => true,
        };

        match (textual, std::str::from_utf8(body)) {
            (true, Ok(text)) => Self::Text(text.to_string()),
            _ => Self::Binary(STANDARD.encode(body)),
        }
    }
}

fn is_textual_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("text/")
        || mime.ends_with("/json")
        || mime.ends_with("+json")
        || mime.ends_with("/xml")
        || mime.ends_with("+xml")
        || mime == "application/javascript"
        || mime == "application/x-www-form-urlencoded"
}

/// A replayable upstream response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub status_code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub content_type: String,
    pub body: CachedBody,
    pub cached_at: DateTime<Utc>,
}

impl CachedEntry {
    /// Captures an upstream response for storage
    pub fn from_response(response: &UpstreamResponse) -> Self {
        let headers = response
            .headers
            .iter()
            .filter(|(name, _)| REPLAY_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();

        let content_type = response.header("content-type");

        Self {
            status_code: response.status_code,
            headers,
            content_type: content_type.unwrap_or(DEFAULT_CONTENT_TYPE).to_string(),
            body: CachedBody::from_bytes(content_type, &response.body),
            cached_at: Utc::now(),
        }
    }

    /// Payload as returned to proxy clients
    ///
    /// JSON bodies are parsed, text is returned as a string and binary
    /// bodies are wrapped in a `_binary` object carrying the base64 data.
    pub fn data(&self) -> Value {
        match &self.body {
            CachedBody::Empty => Value::Null,
            CachedBody::Text(text) => {
                if self.content_type.to_ascii_lowercase().contains("json") {
                    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
                } else {
                    Value::String(text.clone())
                }
            }
            CachedBody::Binary(encoded) => json!({
                "_binary": true,
                "_encoding": "base64",
                "data": encoded,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn decode(body: &CachedBody) -> Vec<u8> {
        match body {
            CachedBody::Empty => Vec::new(),
            CachedBody::Text(text) => text.as_bytes().to_vec(),
            CachedBody::Binary(encoded) => STANDARD.decode(encoded).unwrap(),
        }
    }

    fn response(content_type: Option<&str>, body: &'static [u8]) -> UpstreamResponse {
        let mut headers = vec![("X-Ratelimit-Remaining".to_string(), "41".to_string())];
        headers.push(("Set-Cookie".to_string(), "session=abc".to_string()));

        if let Some(ct) = content_type {
            headers.push(("Content-Type".to_string(), ct.to_string()));
        }

        UpstreamResponse {
            status_code: 200,
            headers,
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn test_json_body_is_text() {
        let entry = CachedEntry::from_response(&response(
            Some("application/json; charset=utf-8"),
            br#"{"answer":42}"#,
        ));

        assert_eq!(entry.body, CachedBody::Text(r#"{"answer":42}"#.to_string()));
        assert_eq!(entry.data(), json!({"answer": 42}));
    }

    #[test]
    fn test_json_data_keeps_key_order_and_number_precision() {
        let body = r#"{"b":1,"id":123456789012345678901234567890,"a":0.10000000000000000555}"#;
        let entry = CachedEntry::from_response(&response(Some("application/json"), body.as_bytes()));

        assert_eq!(serde_json::to_string(&entry.data()).unwrap(), body);

        let restored: CachedEntry =
            serde_json::from_str(&serde_json::to_string(&entry).unwrap()).unwrap();
        assert_eq!(serde_json::to_string(&restored.data()).unwrap(), body);
    }

    #[test]
    fn test_invalid_json_falls_back_to_string() {
        let entry = CachedEntry::from_response(&response(Some("application/json"), b"not json"));
        assert_eq!(entry.data(), Value::String("not json".to_string()));
    }

    #[test]
    fn test_plain_text_body() {
        let entry = CachedEntry::from_response(&response(Some("text/plain"), b"hello"));
        assert_eq!(entry.data(), Value::String("hello".to_string()));
    }

    #[test]
    fn test_binary_body_is_base64_wrapped() {
        let bytes: &'static [u8] = &[0x89, 0x50, 0x4e, 0x47, 0x00, 0xff];
        let entry = CachedEntry::from_response(&response(Some("image/png"), bytes));

        assert!(matches!(entry.body, CachedBody::Binary(_)));
        assert_eq!(decode(&entry.body), bytes.to_vec());

        let data = entry.data();
        assert_eq!(data["_binary"], json!(true));
        assert_eq!(data["_encoding"], json!("base64"));
        assert_eq!(data["data"], json!(STANDARD.encode(bytes)));
    }

    #[test]
    fn test_invalid_utf8_with_text_content_type_is_binary() {
        let entry = CachedEntry::from_response(&response(Some("text/plain"), &[0xff, 0xfe, 0x00]));
        assert!(matches!(entry.body, CachedBody::Binary(_)));
    }

    #[test]
    fn test_missing_content_type_inspects_payload() {
        assert_eq!(
            CachedBody::from_bytes(None, b"plain"),
            CachedBody::Text("plain".to_string())
        );
        assert!(matches!(
            CachedBody::from_bytes(None, &[0xc3, 0x28]),
            CachedBody::Binary(_)
        ));
    }

    #[test]
    fn test_empty_body_is_null() {
        let entry = CachedEntry::from_response(&response(Some("application/json"), b""));

        assert_eq!(entry.body, CachedBody::Empty);
        assert_eq!(entry.data(), Value::Null);
    }

    #[test]
    fn test_only_replay_headers_are_kept() {
        let entry = CachedEntry::from_response(&response(Some("text/plain"), b"x"));

        assert_eq!(entry.headers.get("x-ratelimit-remaining"), Some(&"41".to_string()));
        assert_eq!(entry.headers.get("content-type"), Some(&"text/plain".to_string()));
        assert!(!entry.headers.contains_key("set-cookie"));
    }

    #[test]
    fn test_body_tag_is_serialized() {
        let binary = serde_json::to_value(CachedBody::Binary("AAE=".to_string())).unwrap();
        assert_eq!(binary, json!({"encoding": "binary", "payload": "AAE="}));

        let empty = serde_json::to_value(CachedBody::Empty).unwrap();
        assert_eq!(empty, json!({"encoding": "empty"}));
    }

    #[test]
    fn test_entry_survives_storage_encoding() {
        let entry = CachedEntry::from_response(&response(Some("application/octet-stream"), &[1, 2, 3]));
        let stored = serde_json::to_string(&entry).unwrap();
        let restored: CachedEntry = serde_json::from_str(&stored).unwrap();

        assert_eq!(restored, entry);
        assert_eq!(decode(&restored.body), vec![1, 2, 3]);
    }
}

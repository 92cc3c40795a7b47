use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::upstream::{UpstreamExecutor, UpstreamRequest, UpstreamResponse};
use crate::domain::DomainError;

/// Settings for the outbound HTTP client
#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    /// Whole-request timeout, connect through body
    pub timeout: Duration,
    /// Requests in flight at once, body read included
    pub max_connections: usize,
    pub pool_max_idle_per_host: usize,
    pub follow_redirects: bool,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_connections: 100,
            pool_max_idle_per_host: 32,
            follow_redirects: true,
        }
    }
}

impl UpstreamClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }
}

/// Upstream executor backed by a pooled reqwest client
///
/// A single call is made per request. Non-2xx statuses are returned as
/// responses; only transport failures become errors. At most
/// `max_connections` calls run at once; the rest wait for a permit.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    config: UpstreamClientConfig,
}

impl HttpUpstream {
    pub fn new(config: UpstreamClientConfig) -> Result<Self, DomainError> {
        if config.max_connections == 0 || config.max_connections > Semaphore::MAX_PERMITS {
            return Err(DomainError::configuration(format!(
                "max_connections must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }

        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host.min(config.max_connections))
            .redirect(redirect)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_connections)),
            config,
        })
    }

    fn map_error(&self, url: &str, error: reqwest::Error) -> DomainError {
        if error.is_timeout() {
            DomainError::upstream_timeout(url, self.config.timeout.as_secs_f64())
        } else if error.is_connect() {
            DomainError::upstream_unreachable(url, error.to_string())
        } else {
            DomainError::upstream(url, error.to_string())
        }
    }
}

fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => debug!(header = %name, "Skipping header that cannot be forwarded"),
        }
    }

    map
}

#[async_trait]
impl UpstreamExecutor for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, DomainError> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            DomainError::validation(format!("Unsupported method '{}'", request.method))
        })?;

        // Held until the body is fully read
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DomainError::internal("Upstream connection limiter closed"))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .headers(header_map(&request.headers));

        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_error(&request.url, e))?;

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(&request.url, e))?;

        Ok(UpstreamResponse {
            status_code,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(timeout: Duration) -> HttpUpstream {
        HttpUpstream::new(UpstreamClientConfig::default().with_timeout(timeout)).unwrap()
    }

    fn request(method: &str, url: String) -> UpstreamRequest {
        UpstreamRequest {
            method: method.to_string(),
            url,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_get_returns_status_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(r#"{"id":1}"#),
            )
            .mount(&server)
            .await;

        let response = client(Duration::from_secs(5))
            .send(request("GET", format!("{}/users/1", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.body, Bytes::from_static(br#"{"id":1}"#));
    }

    #[tokio::test]
    async fn test_forwards_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(header("x-api-key", "k1"))
            .and(body_string(r#"{"name":"a"}"#))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request("POST", format!("{}/items", server.uri()));
        req.headers.push(("X-Api-Key".to_string(), "k1".to_string()));
        req.body = Bytes::from_static(br#"{"name":"a"}"#);

        let response = client(Duration::from_secs(5)).send(req).await.unwrap();
        assert_eq!(response.status_code, 201);
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let response = client(Duration::from_secs(5))
            .send(request("GET", server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status_code, 503);
        assert!(!response.is_cacheable());
    }

    #[tokio::test]
    async fn test_timeout_maps_to_upstream_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let result = client(Duration::from_millis(200))
            .send(request("GET", server.uri()))
            .await;

        assert!(matches!(result, Err(DomainError::UpstreamTimeout { .. })));
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_unreachable() {
        let result = client(Duration::from_secs(2))
            .send(request("GET", "http://127.0.0.1:1/".to_string()))
            .await;

        assert!(matches!(result, Err(DomainError::UpstreamUnreachable { .. })));
    }

    #[tokio::test]
    async fn test_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let response = client(Duration::from_secs(5))
            .send(request("GET", format!("{}/old", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, Bytes::from_static(b"moved"));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .expect(4)
            .mount(&server)
            .await;

        let client = HttpUpstream::new(
            UpstreamClientConfig::default()
                .with_timeout(Duration::from_secs(5))
                .with_max_connections(2),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let calls = (0..4).map(|_| client.send(request("GET", server.uri())));
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        // Two waves of two
        assert!(started.elapsed() >= Duration::from_millis(580));
        assert_eq!(client.permits.available_permits(), 2);
    }

    #[test]
    fn test_zero_max_connections_is_rejected() {
        let result = HttpUpstream::new(UpstreamClientConfig::default().with_max_connections(0));
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_invalid_method_is_rejected() {
        let result = client(Duration::from_secs(1))
            .send(request("BAD METHOD", "http://127.0.0.1:1/".to_string()))
            .await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }
}

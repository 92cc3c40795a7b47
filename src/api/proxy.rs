//! Proxy endpoints

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderMap, Method},
    Json,
};
use tracing::info;

use super::state::AppState;
use super::types::{ApiError, ProxyQuery, RawBody};
use crate::domain::ProxyEnvelope;

fn parse_query(query: Result<Query<ProxyQuery>, QueryRejection>) -> Result<ProxyQuery, ApiError> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ApiError::bad_request(format!("Invalid query string: {}", e.body_text())))
}

/// `/proxy` - forwards any supported method through the cache
pub async fn proxy_request(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    query: Result<Query<ProxyQuery>, QueryRejection>,
    RawBody(body): RawBody,
) -> Result<Json<ProxyEnvelope>, ApiError> {
    let request = parse_query(query)?.into_request(&method, &headers, body)?;

    info!(
        method = %request.method,
        url = %request.url,
        bypass_cache = request.bypass,
        "Proxy request"
    );

    let envelope = state.proxy_service.handle(request).await?;

    Ok(Json(envelope))
}

/// `POST /webhook-test/post-response` - older route kept for existing workflows
///
/// Behaves like `POST /proxy` without bypass or TTL override.
pub async fn legacy_proxy_request(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    query: Result<Query<ProxyQuery>, QueryRejection>,
    RawBody(body): RawBody,
) -> Result<Json<ProxyEnvelope>, ApiError> {
    let query = parse_query(query)?;
    let request = ProxyQuery {
        url: query.url,
        ..Default::default()
    }
    .into_request(&method, &headers, body)?;

    info!(url = %request.url, "Legacy proxy request");

    let envelope = state.proxy_service.handle(request).await?;

    Ok(Json(envelope))
}

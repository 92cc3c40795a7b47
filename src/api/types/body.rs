//! Raw body extractor that returns errors as JSON

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
};

use super::error::ApiError;

/// Request body as raw bytes
///
/// Wraps the `Bytes` extractor so that rejections, including bodies over
/// the configured limit, use the API error format.
#[derive(Debug, Clone, Default)]
pub struct RawBody(pub Bytes);

impl<S> FromRequest<S> for RawBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Bytes::from_request(req, state).await {
            Ok(bytes) => Ok(RawBody(bytes)),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Err(ApiError::payload_too_large("Request body exceeds the configured limit")
                    .with_code("body_too_large"))
            }
            Err(rejection) => Err(ApiError::bad_request(format!(
                "Failed to read request body: {}",
                rejection.body_text()
            ))),
        }
    }
}

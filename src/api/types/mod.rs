//! API request and error types

pub mod body;
pub mod error;
pub mod proxy;

pub use body::RawBody;
pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use proxy::ProxyQuery;

use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Failed to connect to upstream '{url}': {message}")]
    UpstreamUnreachable { url: String, message: String },

    #[error("Upstream '{url}' timed out after {timeout_secs}s")]
    UpstreamTimeout { url: String, timeout_secs: f64 },

    #[error("Upstream error for '{url}': {message}")]
    Upstream { url: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn upstream_unreachable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamUnreachable {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn upstream_timeout(url: impl Into<String>, timeout_secs: f64) -> Self {
        Self::UpstreamTimeout {
            url: url.into(),
            timeout_secs,
        }
    }

    pub fn upstream(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error originated from the upstream call
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnreachable { .. } | Self::UpstreamTimeout { .. } | Self::Upstream { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("Missing 'url' query parameter");
        assert_eq!(
            error.to_string(),
            "Validation error: Missing 'url' query parameter"
        );
    }

    #[test]
    fn test_upstream_timeout_error() {
        let error = DomainError::upstream_timeout("https://svc/x", 30.0);
        assert_eq!(error.to_string(), "Upstream 'https://svc/x' timed out after 30s");
        assert!(error.is_upstream());
    }

    #[test]
    fn test_cache_error_is_not_upstream() {
        let error = DomainError::cache("connection refused");
        assert!(!error.is_upstream());
    }
}

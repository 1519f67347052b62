//! Provider error taxonomy and retryability classification.

use thiserror::Error;

use docsmith_core::DocsmithError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rejected the credentials")]
    Unauthorized,
    #[error("provider resource not found: {0}")]
    NotFound(String),
    #[error("provider rate limit exceeded")]
    RateLimited,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Rate limits, 5xx responses and network failures are worth retrying;
    /// everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Unavailable(_)
        )
    }

    /// Classify an HTTP status from the provider.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            401 | 403 => ProviderError::Unauthorized,
            404 => ProviderError::NotFound(context.to_string()),
            429 => ProviderError::RateLimited,
            _ if status.is_server_error() => {
                ProviderError::Unavailable(format!("{context}: HTTP {status}"))
            }
            _ => ProviderError::Malformed(format!("{context}: HTTP {status}")),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ProviderError::Unavailable(err.to_string())
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

impl From<ProviderError> for DocsmithError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unauthorized => DocsmithError::Unauthorized,
            ProviderError::NotFound(what) => DocsmithError::NotFound(what),
            ProviderError::RateLimited => DocsmithError::ProviderRateLimited,
            ProviderError::Unavailable(msg) | ProviderError::Malformed(msg) => {
                DocsmithError::ProviderUnavailable(msg)
            }
        }
    }
}

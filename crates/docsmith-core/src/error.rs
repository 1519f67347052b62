//! Error taxonomy shared across the pipeline.
//!
//! Every failure the system reports falls into one of these kinds; the web
//! layer maps boundary kinds onto HTTP status codes and background kinds
//! onto `error` run status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocsmithError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider rate limited")]
    ProviderRateLimited,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("analyzer failed with exit code {exit_code:?}: {stderr_tail}")]
    AnalyzerFailed {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("analyzer timeout after {timeout_secs}s")]
    AnalyzerTimeout { timeout_secs: u64 },

    #[error("webhook signature invalid")]
    SignatureInvalid,

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DocsmithError {
    /// Stable machine-readable kind, used in logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DocsmithError::Unauthorized => "unauthorized",
            DocsmithError::BadRequest(_) => "bad_request",
            DocsmithError::NotFound(_) => "not_found",
            DocsmithError::ProviderUnavailable(_) => "provider_unavailable",
            DocsmithError::ProviderRateLimited => "provider_rate_limited",
            DocsmithError::StorageUnavailable(_) => "storage_unavailable",
            DocsmithError::AnalyzerFailed { .. } => "analyzer_failed",
            DocsmithError::AnalyzerTimeout { .. } => "analyzer_timeout",
            DocsmithError::SignatureInvalid => "signature_invalid",
            DocsmithError::ConfigurationMissing(_) => "configuration_missing",
            DocsmithError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_snake_case() {
        assert_eq!(DocsmithError::Unauthorized.kind(), "unauthorized");
        assert_eq!(
            DocsmithError::AnalyzerTimeout { timeout_secs: 1800 }.kind(),
            "analyzer_timeout"
        );
        assert_eq!(DocsmithError::SignatureInvalid.kind(), "signature_invalid");
    }

    #[test]
    fn analyzer_timeout_message_names_timeout() {
        let err = DocsmithError::AnalyzerTimeout { timeout_secs: 1800 };
        assert!(err.to_string().contains("timeout"));
    }
}

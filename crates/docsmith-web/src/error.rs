//! Error-to-response mapping.
//!
//! Clients always receive a JSON body with a stable `error` kind; stack
//! traces and internal detail stay in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use docsmith_core::DocsmithError;
use docsmith_github::ProviderError;
use docsmith_store::StoreError;

pub struct ApiError(pub DocsmithError);

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            DocsmithError::Unauthorized => StatusCode::UNAUTHORIZED,
            DocsmithError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DocsmithError::NotFound(_) => StatusCode::NOT_FOUND,
            DocsmithError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            DocsmithError::ProviderRateLimited => StatusCode::TOO_MANY_REQUESTS,
            DocsmithError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            DocsmithError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DocsmithError::ConfigurationMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DocsmithError::AnalyzerFailed { .. }
            | DocsmithError::AnalyzerTimeout { .. }
            | DocsmithError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(kind = self.0.kind(), error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<DocsmithError> for ApiError {
    fn from(err: DocsmithError) -> Self {
        Self(err)
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self(err.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_errors_map_to_their_status_codes() {
        assert_eq!(
            ApiError(DocsmithError::Unauthorized).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError(DocsmithError::SignatureInvalid).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError(DocsmithError::BadRequest("x".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(DocsmithError::NotFound("x".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(DocsmithError::ConfigurationMissing("secret".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

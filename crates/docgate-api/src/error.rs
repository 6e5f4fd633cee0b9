use axum::Json;
use axum::response::{IntoResponse, Response};
use docgate_common::error::{BackendError, GatewayError};

use crate::dispatch::log_failure;
use crate::normalize;

/// Error returned by the transfer endpoints.
///
/// Rendered as `{"error": {"code", "message"}}` with the status that matches
/// the code; backend causes never leave the process.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = normalize::failure(&self.0);
        (status, Json(body)).into_response()
    }
}

impl ApiError {
    /// Logs `err` against `operation` before it is rendered.
    pub fn logged(operation: &str, err: GatewayError) -> Self {
        log_failure(operation, &err);
        ApiError(err)
    }

    pub fn malformed(rejection: impl std::fmt::Display) -> Self {
        ApiError(GatewayError::InvalidArgument(format!(
            "malformed request: {rejection}"
        )))
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        ApiError(GatewayError::Backend(err))
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    #[test]
    fn status_follows_the_error_kind() {
        let missing = ApiError(GatewayError::NotFound("a.pdf".to_string())).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let invalid = ApiError(GatewayError::MissingField("documentName")).into_response();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let backend = ApiError::from(BackendError::Timeout(std::time::Duration::from_secs(1)))
            .into_response();
        assert_eq!(backend.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

//! Error types for the triage HTTP surfaces

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use triage_common::review::ValidationError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or wrong admin token (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409), e.g. batch already running or review already enriched
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No text generation capability configured (503)
    #[error("AI enrichment unavailable: {0}")]
    AiUnavailable(String),

    /// Backing store could not be read or written (503)
    #[error("Review store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<triage_common::Error> for ApiError {
    fn from(err: triage_common::Error) -> Self {
        use triage_common::Error as E;
        match err {
            E::InvalidInput(msg) => ApiError::BadRequest(msg),
            E::NotFound(msg) => ApiError::NotFound(msg),
            E::Conflict(msg) => ApiError::Conflict(msg),
            E::Config(msg) | E::Internal(msg) => ApiError::Internal(msg),
            other if other.is_store_failure() => ApiError::StoreUnavailable(other.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::AiUnavailable(_) | ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::AiUnavailable(_) => "AI_UNAVAILABLE",
            ApiError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::AiUnavailable(msg)
            | ApiError::StoreUnavailable(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.message(),
            }
        }));

        if matches!(self, ApiError::Unauthorized(_)) {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }
        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_error_mapping() {
        let cases = [
            (triage_common::Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (triage_common::Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (triage_common::Error::Conflict("x".into()), StatusCode::CONFLICT),
            (triage_common::Error::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                triage_common::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_validation_is_bad_request() {
        let err = ApiError::from(ValidationError::ReviewTooShort);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("at least 10 characters"));
    }

    #[tokio::test]
    async fn test_json_body_shape() {
        let response = ApiError::Conflict("batch running".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "CONFLICT");
        assert_eq!(body["error"]["message"], "batch running");
    }
}

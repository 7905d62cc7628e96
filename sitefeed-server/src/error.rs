//! Error types for sitefeed-server
//!
//! Every failure leaves the service as `{"success": false, "error": {"code",
//! "message"}}`. Infrastructure detail is logged, never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sitefeed_common::Error as CommonError;
use thiserror::Error;

/// Message returned in place of infrastructure error detail
const GENERIC_FAILURE: &str = "An unexpected error occurred";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed id, query string, or body (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// sitefeed-common error
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ApiError {
    /// Status and machine-readable code for the wire
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Common(err) => match err {
                CommonError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                CommonError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                CommonError::InvalidMediaType(_) => (StatusCode::BAD_REQUEST, "INVALID_FILE_TYPE"),
                CommonError::ImageProcessing(_) => (StatusCode::BAD_REQUEST, "IMAGE_PROCESSING_ERROR"),
                CommonError::FileTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
                CommonError::TooManyFiles(_) => (StatusCode::PAYLOAD_TOO_LARGE, "TOO_MANY_FILES"),
                CommonError::NoFilesProvided => (StatusCode::BAD_REQUEST, "NO_FILES"),
                CommonError::Persistence(_) => (StatusCode::BAD_REQUEST, "DATABASE_CONSTRAINT"),
                CommonError::NoFieldsProvided => (StatusCode::BAD_REQUEST, "NO_FIELDS_PROVIDED"),
                CommonError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                CommonError::Io(_) | CommonError::Config(_) | CommonError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg.clone(),
            ApiError::Common(CommonError::NotFound(msg)) => msg.clone(),
            ApiError::Common(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "Request failed");
            GENERIC_FAILURE.to_string()
        } else {
            tracing::debug!(code = error_code, error = %self, "Request rejected");
            self.client_message()
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

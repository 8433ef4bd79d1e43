//! Error types for jrep-export

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown job, or unknown/expired/consumed report handle (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Job progress already claimed by another subscriber (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Report rendering failed (500)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Csv(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CSV_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let response = ApiError::NotFound("Report not found: abc".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::Conflict("already claimed".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}

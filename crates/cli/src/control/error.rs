//! Control API error handling.
//!
//! Every failure is answered with `{code, message}` and a matching status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use contracts::ContractError;
use listener::SupervisorError;
use serde::Serialize;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// API error type that can be converted to HTTP responses
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// 400 Bad Request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// 404 Not Found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// 409 Conflict
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// 422 Unprocessable Entity
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// 500 Internal Server Error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// 503 Service Unavailable
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ContractError> for ApiError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::InvalidUrl { .. }
            | ContractError::DuplicateTarget { .. }
            | ContractError::EmptyTargets { .. } => ApiError::validation(err.to_string()),
            ContractError::RouteExists { .. } => ApiError::conflict(err.to_string()),
            ContractError::RouteNotFound { .. } | ContractError::TargetNotFound { .. } => {
                ApiError::not_found(err.to_string())
            }
            ContractError::ConfigInvalid { .. } => ApiError::bad_request(err.to_string()),
            ContractError::ListenerInit { .. } => ApiError::service_unavailable(err.to_string()),
            ContractError::Io(e) => {
                tracing::error!("IO error: {}", e);
                ApiError::internal("IO error occurred")
            }
            ContractError::Other(msg) => {
                tracing::error!("Unexpected error: {}", msg);
                ApiError::internal("An unexpected error occurred")
            }
        }
    }
}

impl From<SupervisorError> for ApiError {
    fn from(err: SupervisorError) -> Self {
        ApiError::service_unavailable(err.to_string())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_path_errors_map_to_status() {
        let cases = [
            (
                ContractError::duplicate_target("555@x", "http://a.test/h1"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ContractError::invalid_url("555@x", "ftp://x", "scheme"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ContractError::RouteExists {
                    conversation_id: "555@x".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                ContractError::RouteNotFound {
                    conversation_id: "555@x".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ContractError::config_invalid("empty document"),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_supervisor_closed_is_unavailable() {
        let err = ApiError::from(SupervisorError::Closed);
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, "SERVICE_UNAVAILABLE");
    }
}

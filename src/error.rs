//! Centralized API error type, following the structured error envelope
//! used across the teacher's handler layer: logs full detail (code,
//! request id) server-side, returns a flat `{ "error": string, "details":
//! array }` body to the client.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Unavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn sanitized_message(&self) -> String {
        match self {
            ApiError::BadRequest(m) => m.clone(),
            ApiError::NotFound(m) => m.clone(),
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::Unavailable(m) => m.clone(),
        }
    }

    pub fn with_details(self, details: Value) -> ApiErrorWithDetails {
        ApiErrorWithDetails {
            error: self,
            details: Some(details),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let request_id = Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            code = self.error_code(),
            "API error ({}): {}",
            status.as_u16(),
            self
        );

        let body = json!({
            "error": self.sanitized_message(),
        });
        (status, Json(body)).into_response()
    }
}

/// `ApiError` with optional structured `details` attached — used for
/// validation failures where the client needs the per-field breakdown.
pub struct ApiErrorWithDetails {
    pub error: ApiError,
    pub details: Option<Value>,
}

impl From<ApiError> for ApiErrorWithDetails {
    fn from(err: ApiError) -> Self {
        ApiErrorWithDetails {
            error: err,
            details: None,
        }
    }
}

impl IntoResponse for ApiErrorWithDetails {
    fn into_response(self) -> axum::response::Response {
        let status = self.error.status_code();
        let request_id = Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            code = self.error.error_code(),
            "API error ({}): {}",
            status.as_u16(),
            self.error
        );

        let mut body = json!({
            "error": self.error.sanitized_message(),
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}

/// Per-field validation failure, distinct from the `ValidationError` codes
/// used internally by the file validator — this enumerates client-input
/// shape problems at the HTTP boundary (multipart fields, query params).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct FieldError {
    pub path: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(path: &'static str, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

pub fn validation_failed(errors: Vec<FieldError>) -> ApiErrorWithDetails {
    let details: Value = errors
        .iter()
        .map(|e| json!({ "path": e.path, "message": e.message }))
        .collect();
    ApiError::BadRequest("Validation failed".to_string()).with_details(details)
}

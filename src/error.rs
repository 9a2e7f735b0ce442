//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses. Every error leaves the service inside the standard
//! response envelope (`{ "data": null, "meta": {}, "error": {...} }`), never
//! as a raw message or stack trace.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::response::ApiResponse;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and a stable error code
/// string that clients can match on.
///
/// # Error Categories
///
/// - **Authentication**: missing or unresolvable API key
/// - **Authorization**: the resolved key does not hold the required scope
/// - **Invariant conflicts**: the mutation would break single-admin or
///   admin-scope consistency and was rejected without being applied
/// - **Resource errors**: unknown ids
/// - **Validation errors**: bad values (400) or malformed bodies (422)
/// - **Internal faults**: database and other unexpected failures
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Returns HTTP 500. Details are logged, never sent to the client.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, unknown, or revoked.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Missing or invalid API key")]
    Unauthenticated,

    /// The key is valid but its scope does not cover the operation.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("{0}")]
    InsufficientScope(String),

    /// The mutation would violate a credential invariant.
    ///
    /// Returns HTTP 409 Conflict. The store state is unchanged.
    #[error("{0}")]
    Conflict(String),

    /// Referenced resource does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("{0}")]
    NotFound(String),

    /// The path exists but does not accept the request method.
    ///
    /// Returns HTTP 405 Method Not Allowed.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Request value is invalid (for example an unknown scope name).
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// Request body could not be parsed or failed field validation.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("{0}")]
    MalformedBody(String),

    /// Any other unexpected failure (panicked handler, blocking task
    /// failure, corrupt stored value).
    ///
    /// Returns HTTP 500.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and stable error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::InsufficientScope(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::MalformedBody(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            AppError::Database(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "data": null,
///   "meta": {},
///   "error": { "code": "CONFLICT", "message": "Only one active admin key is allowed" }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error while handling request");
                "Internal server error".to_string()
            }
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal fault while handling request");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, ApiResponse::<()>::error(code, message)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn conflict_renders_envelope() {
        let (status, body) =
            body_json(AppError::Conflict("Only one active admin key is allowed".into())).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["data"].is_null());
        assert_eq!(body["error"]["code"], "CONFLICT");
        assert_eq!(body["error"]["message"], "Only one active admin key is allowed");
        assert!(body["meta"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let (status, body) = body_json(AppError::Internal("salt column corrupt".into())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "Internal server error");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::Unauthenticated.status_and_code().0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::MalformedBody("x".into()).status_and_code(),
            (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
        );
        assert_eq!(
            AppError::InsufficientScope("x".into()).status_and_code().0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::MethodNotAllowed.status_and_code(),
            (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED")
        );
    }
}

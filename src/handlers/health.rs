//! Health check endpoint for service monitoring.
//!
//! Lives under the API prefix but outside the protected namespace: no key,
//! no audit entry.

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{app::AppState, error::AppError, models::response::ApiResponse};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Database connection status
    pub database: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "data": { "status": "ok", "database": "connected", "timestamp": "2025-12-21T19:00:00Z" },
///   "meta": {},
///   "error": null
/// }
/// ```
///
/// If the database is unreachable, returns the standard 500 envelope.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<ApiResponse<HealthResponse>, AppError> {
    // Verify database connectivity with simple query
    sqlx::query("SELECT 1").execute(state.keys.pool()).await?;

    Ok(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        database: "connected".to_string(),
        timestamp: Utc::now(),
    }))
}

/// Fallback for unknown routes, so they answer in the envelope too.
pub async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

/// Fallback for known paths hit with an unsupported method.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

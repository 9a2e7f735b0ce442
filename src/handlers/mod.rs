//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives the resolved identity and request data (JSON body, URL params, query)
//! 2. Calls into the services layer
//! 3. Returns the JSON envelope, or an `AppError` that renders as one

/// Key management, audit trail and diagnostics endpoints
pub mod admin;
/// Liveness probe and unknown-route fallback
pub mod health;
/// Caller identity endpoint
pub mod identity;

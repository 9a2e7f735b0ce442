//! HTTP middleware components.
//!
//! The request pipeline, outermost first:
//! 1. `audit` - records one audit entry per protected request
//! 2. `auth` - resolves the `X-API-Key` header to an identity (401 otherwise)
//! 3. `scope` - checks the identity's scope against the request method (403 otherwise)
//!
//! Paths outside the protected namespace pass through all three untouched.

/// Audit trail stage
pub mod audit;
/// API key authentication stage
pub mod auth;
/// Scope authorization stage and inline guards
pub mod scope;

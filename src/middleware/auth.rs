//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the `X-API-Key` header
//! 2. Resolve it against the stored salted digests
//! 3. Attach the resolved identity to the request
//! 4. Reject unauthenticated requests with HTTP 401

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    app::AppState,
    error::AppError,
    middleware::audit::IdentitySlot,
    models::{api_key::ApiKey, scope::Scope},
};

/// Header carrying the raw API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Authentication context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers (`Extension<AuthContext>`) to know who made
/// the request. It never carries the digest or salt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthContext {
    /// ID of the authenticated API key, used to correlate audit entries
    pub api_key_id: i64,

    pub label: String,

    /// Scope held at the time of the request
    pub scope: Scope,

    pub is_admin: bool,

    pub created_at: DateTime<Utc>,

    /// Previous use, as stored before this request touched it
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<&ApiKey> for AuthContext {
    fn from(key: &ApiKey) -> Self {
        Self {
            api_key_id: key.id,
            label: key.label.clone(),
            scope: key.scope,
            is_admin: key.is_admin,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
        }
    }
}

/// Handlers take `AuthContext` directly. Without a resolved identity the
/// extractor rejects with 401, so a route mounted outside the pipeline fails
/// closed.
impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Skip paths outside the protected namespace
/// 2. Read `X-API-Key`; missing or non-ASCII → 401
/// 3. Resolve the key; unknown or revoked → 401
/// 4. Insert `AuthContext` into request extensions and the audit identity slot
/// 5. Record the use (best-effort), then call the next stage
///
/// A store failure while resolving surfaces as a 500, never as a pass.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.routes.is_protected(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;

    let key = state
        .keys
        .resolve(api_key)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let auth_context = AuthContext::from(&key);

    if let Some(slot) = request.extensions().get::<IdentitySlot>() {
        slot.set(auth_context.clone());
    }
    request.extensions_mut().insert(auth_context);

    state.keys.touch_last_used(key.id).await;

    Ok(next.run(request).await)
}

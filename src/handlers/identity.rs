//! Identity introspection.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    middleware::auth::AuthContext,
    models::{response::ApiResponse, scope::Scope},
};

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub id: i64,
    pub label: String,
    pub scope: Scope,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// `GET /v1/whoami` - the caller's own key, as resolved by the pipeline.
///
/// Answers 401 when no identity was resolved.
pub async fn whoami(auth: AuthContext) -> ApiResponse<WhoAmIResponse> {
    ApiResponse::ok(WhoAmIResponse {
        id: auth.api_key_id,
        label: auth.label,
        scope: auth.scope,
        is_admin: auth.is_admin,
        // Only active keys resolve.
        is_active: true,
        created_at: auth.created_at,
        last_used_at: auth.last_used_at,
    })
}

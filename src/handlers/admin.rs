//! Admin HTTP handlers.
//!
//! This module implements the key management and audit endpoints:
//! - GET  /v1/admin/api-keys - List keys
//! - POST /v1/admin/api-keys - Mint a key
//! - POST /v1/admin/api-keys/{id}/revoke - Revoke a key
//! - POST /v1/admin/api-keys/{id}/scope - Change a non-admin key's scope
//! - POST /v1/admin/api-keys/{id}/admin - Promote or demote a key
//! - POST /v1/admin/api-keys/{id}/handover - Hand the caller's admin role to another key
//! - GET  /v1/admin/audit-logs - Audit entries, newest first
//! - GET  /v1/admin/diagnostics - Runtime configuration summary
//!
//! The generic authorization stage skips these routes. Every handler calls
//! `require_admin_scope` first.

use axum::extract::State;
use serde::Serialize;

use crate::{
    app::AppState,
    config::DocumentStorageSettings,
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    middleware::{
        auth::AuthContext,
        scope::{require_admin_scope, require_feature},
    },
    models::{
        api_key::{
            ApiKeySummary, CreateApiKeyRequest, CreatedApiKeyResponse, ListApiKeysQuery,
            UpdateAdminRequest, UpdateScopeRequest,
        },
        audit::{AuditEntry, AuditLogQuery},
        response::{ApiResponse, Page},
        scope::Scope,
    },
    services::key_store::{ADMIN_SCOPE_MESSAGE, NOT_FOUND_MESSAGE, SELF_DEMOTION_MESSAGE},
};

/// Feature name gating the diagnostics endpoint.
pub const DIAGNOSTICS_FEATURE: &str = "diagnostics";

#[derive(Debug, Serialize)]
pub struct KeyStatusResponse {
    pub status: &'static str,
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub doc_encryption_enabled: bool,
    pub docs_dir: String,
    pub hash_iterations: u32,
    pub active_keys: i64,
    pub active_admin_keys: i64,
}

/// List keys, active only unless `include_inactive=true`.
///
/// # Endpoint
///
/// `GET /v1/admin/api-keys?include_inactive=false`
///
/// Digests and salts are never included.
pub async fn list_api_keys(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<ListApiKeysQuery>,
) -> Result<ApiResponse<Vec<ApiKeySummary>>, AppError> {
    require_admin_scope(&auth)?;

    let keys = state.keys.list(query.include_inactive).await?;
    Ok(ApiResponse::ok(keys))
}

/// Mint a key.
///
/// # Endpoint
///
/// `POST /v1/admin/api-keys`
///
/// # Request Body
///
/// ```json
/// { "label": "ci", "is_admin": false, "scope": "write" }
/// ```
///
/// # Response
///
/// - **200**: the raw key, shown this one time only
/// - **400**: unknown scope, or `scope = admin` without `is_admin = true`
/// - **409**: an active admin key already exists
/// - **422**: empty label or malformed body
pub async fn create_api_key(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateApiKeyRequest>,
) -> Result<ApiResponse<CreatedApiKeyResponse>, AppError> {
    require_admin_scope(&auth)?;

    let label = request.label.trim();
    if label.is_empty() {
        return Err(AppError::MalformedBody("label must not be empty".to_string()));
    }

    let scope: Scope = request.scope.parse()?;
    if scope == Scope::Admin && !request.is_admin {
        return Err(AppError::InvalidRequest(ADMIN_SCOPE_MESSAGE.to_string()));
    }

    let minted = state.keys.mint(label, request.is_admin, scope).await?;

    Ok(ApiResponse::ok(CreatedApiKeyResponse {
        id: minted.id,
        api_key: minted.raw_secret,
        label: label.to_string(),
        scope: if request.is_admin { Scope::Admin } else { scope },
        is_admin: request.is_admin,
    }))
}

/// Revoke a key. Revoking an already revoked key succeeds.
///
/// `POST /v1/admin/api-keys/{id}/revoke` → 404 for an unknown id.
pub async fn revoke_api_key(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<KeyStatusResponse>, AppError> {
    require_admin_scope(&auth)?;

    if !state.keys.revoke(id).await? {
        return Err(AppError::NotFound(NOT_FOUND_MESSAGE.to_string()));
    }

    Ok(ApiResponse::ok(KeyStatusResponse {
        status: "revoked",
        id,
        scope: None,
        is_admin: None,
    }))
}

/// Change a non-admin key's scope.
///
/// `POST /v1/admin/api-keys/{id}/scope` with `{ "scope": "read" | "write" }`.
/// 400 for any other scope, 404 for an unknown id, 409 for an admin key
/// (demote it first).
pub async fn update_api_key_scope(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateScopeRequest>,
) -> Result<ApiResponse<KeyStatusResponse>, AppError> {
    require_admin_scope(&auth)?;

    let scope = match request.scope.parse::<Scope>() {
        Ok(scope @ (Scope::Read | Scope::Write)) => scope,
        _ => {
            return Err(AppError::InvalidRequest(
                "Scope must be read or write".to_string(),
            ));
        }
    };

    state.keys.set_scope(id, scope).await?;

    Ok(ApiResponse::ok(KeyStatusResponse {
        status: "updated",
        id,
        scope: Some(scope),
        is_admin: None,
    }))
}

/// Promote or demote a key.
///
/// `POST /v1/admin/api-keys/{id}/admin` with `{ "is_admin": bool }`.
/// 404 for an unknown id, 409 when promotion would create a second active
/// admin, 409 when the caller tries to demote its own key (use the handover
/// endpoint instead).
pub async fn update_api_key_admin(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateAdminRequest>,
) -> Result<ApiResponse<KeyStatusResponse>, AppError> {
    require_admin_scope(&auth)?;

    if !request.is_admin && id == auth.api_key_id {
        return Err(AppError::Conflict(SELF_DEMOTION_MESSAGE.to_string()));
    }

    state.keys.set_admin(id, request.is_admin).await?;

    Ok(ApiResponse::ok(KeyStatusResponse {
        status: "updated",
        id,
        scope: None,
        is_admin: Some(request.is_admin),
    }))
}

/// Hand the caller's admin role to another active key.
///
/// `POST /v1/admin/api-keys/{id}/handover`. The target becomes the sole
/// active admin and the caller drops to `read`, atomically. 400 when the
/// target is the caller, 404 for an unknown id, 409 for a revoked target.
pub async fn hand_over_admin(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<KeyStatusResponse>, AppError> {
    require_admin_scope(&auth)?;

    state.keys.hand_over_admin(auth.api_key_id, id).await?;

    Ok(ApiResponse::ok(KeyStatusResponse {
        status: "handed_over",
        id,
        scope: Some(Scope::Admin),
        is_admin: Some(true),
    }))
}

/// Audit entries, newest first.
///
/// `GET /v1/admin/audit-logs?limit=50&offset=0`. `limit` is clamped to
/// 1..=200 and `offset` to >= 0; `meta` carries the page.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<AuditLogQuery>,
) -> Result<ApiResponse<Vec<AuditEntry>>, AppError> {
    require_admin_scope(&auth)?;

    let page = Page::new(query.limit, query.offset);
    let (entries, total) = state.audit.list(page).await?;
    Ok(ApiResponse::paged(entries, page.meta(total)))
}

pub async fn diagnostics(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<ApiResponse<DiagnosticsResponse>, AppError> {
    require_admin_scope(&auth)?;
    require_feature(state.features.as_ref(), &auth, DIAGNOSTICS_FEATURE)?;

    let DocumentStorageSettings {
        encryption_enabled,
        docs_dir,
    } = state.documents.as_ref().clone();

    Ok(ApiResponse::ok(DiagnosticsResponse {
        doc_encryption_enabled: encryption_enabled,
        docs_dir,
        hash_iterations: state.keys.hasher().iterations(),
        active_keys: state.keys.count_active().await?,
        active_admin_keys: state.keys.active_admin_count().await?,
    }))
}

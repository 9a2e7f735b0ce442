//! Application state and router construction.
//!
//! `main` and the integration tests build the exact same router through
//! [`build_router`], so the tests exercise the production pipeline.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    config::{DocumentStorageSettings, RouteSettings},
    db::DbPool,
    handlers,
    middleware::{
        audit::audit_middleware,
        auth::auth_middleware,
        scope::{AdminOnlyGrants, FeatureGrants, authorize_middleware},
    },
    services::{audit_log::AuditLog, hasher::CredentialHasher, key_store::ApiKeyStore},
};

/// Shared state handed to every handler and middleware stage.
#[derive(Clone)]
pub struct AppState {
    pub keys: ApiKeyStore,
    pub audit: AuditLog,
    pub routes: Arc<RouteSettings>,
    pub features: Arc<dyn FeatureGrants>,
    pub documents: Arc<DocumentStorageSettings>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        hasher: CredentialHasher,
        routes: RouteSettings,
        documents: DocumentStorageSettings,
    ) -> Self {
        Self {
            keys: ApiKeyStore::new(pool.clone(), hasher),
            audit: AuditLog::new(pool),
            routes: Arc::new(routes),
            features: Arc::new(AdminOnlyGrants),
            documents: Arc::new(documents),
        }
    }

    /// Replace the feature-grant policy.
    pub fn with_features(mut self, features: Arc<dyn FeatureGrants>) -> Self {
        self.features = features;
        self
    }
}

/// Build the full application router.
///
/// Routes live under the configured prefix. Anything else under the prefix
/// falls through to an enveloped 404, and a known path with the wrong method
/// to an enveloped 405. Both are audited like any other protected request.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Liveness probe, outside the protected namespace
        .route("/health", get(handlers::health::health_check))
        .route("/whoami", get(handlers::identity::whoami))
        // Key management
        .route(
            "/admin/api-keys",
            get(handlers::admin::list_api_keys).post(handlers::admin::create_api_key),
        )
        .route(
            "/admin/api-keys/{id}/revoke",
            post(handlers::admin::revoke_api_key),
        )
        .route(
            "/admin/api-keys/{id}/scope",
            post(handlers::admin::update_api_key_scope),
        )
        .route(
            "/admin/api-keys/{id}/admin",
            post(handlers::admin::update_api_key_admin),
        )
        .route(
            "/admin/api-keys/{id}/handover",
            post(handlers::admin::hand_over_admin),
        )
        // Audit trail and diagnostics
        .route("/admin/audit-logs", get(handlers::admin::list_audit_logs))
        .route("/admin/diagnostics", get(handlers::admin::diagnostics))
        // Applies to the routes above, so it must come last
        .method_not_allowed_fallback(handlers::health::method_not_allowed);

    let prefix = state.routes.prefix.trim_end_matches('/').to_string();
    let router = Router::new()
        .nest(&prefix, api)
        .fallback(handlers::health::not_found);

    with_pipeline(router, state)
}

/// Wrap `router` in the request pipeline and attach the state.
///
/// Layers apply bottom-up, so the audit stage is outermost and sees the
/// final status of every request, including rejections by the inner stages.
pub fn with_pipeline(router: Router<AppState>, state: AppState) -> Router {
    router
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            authorize_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            audit_middleware,
        ))
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

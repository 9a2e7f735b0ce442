//! Scope-based authorization.
//!
//! The generic stage derives the required scope from the request method.
//! Admin routes skip it and call [`require_admin_scope`] inline, which is
//! stricter (exactly `admin`). Finer-grained checks go through
//! [`FeatureGrants`].

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    app::AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::scope::Scope,
};

/// Authorization middleware. Runs after [`auth_middleware`](super::auth::auth_middleware).
///
/// Returns 403 when the resolved key's scope is below the requirement of
/// the request method. A request with no resolved identity is refused with
/// 401 rather than let through.
pub async fn authorize_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    if !state.routes.is_protected(path) || state.routes.is_admin(path) {
        return Ok(next.run(request).await);
    }

    let auth = request
        .extensions()
        .get::<AuthContext>()
        .ok_or(AppError::Unauthenticated)?;

    let required = Scope::required_for(request.method());
    if !auth.scope.satisfies(required) {
        tracing::debug!(
            api_key_id = auth.api_key_id,
            held = %auth.scope,
            required = %required,
            "insufficient scope"
        );
        return Err(AppError::InsufficientScope(format!(
            "Scope '{required}' required"
        )));
    }

    Ok(next.run(request).await)
}

/// Inline guard for admin endpoints: the key's scope must be exactly `admin`.
pub fn require_admin_scope(auth: &AuthContext) -> Result<(), AppError> {
    if auth.scope == Scope::Admin {
        Ok(())
    } else {
        Err(AppError::InsufficientScope(
            "Admin scope 'admin' required".to_string(),
        ))
    }
}

/// Decides whether a key may use a named capability beyond the three tiers.
///
/// Handlers depend on this trait only, so a per-feature grant table can
/// replace [`AdminOnlyGrants`] without touching them.
pub trait FeatureGrants: Send + Sync {
    fn has_feature(&self, auth: &AuthContext, feature: &str) -> bool;
}

/// Grants every feature to admin-scoped keys and nothing to anyone else.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminOnlyGrants;

impl FeatureGrants for AdminOnlyGrants {
    fn has_feature(&self, auth: &AuthContext, _feature: &str) -> bool {
        auth.scope == Scope::Admin
    }
}

pub fn require_feature(
    grants: &dyn FeatureGrants,
    auth: &AuthContext,
    feature: &str,
) -> Result<(), AppError> {
    if grants.has_feature(auth, feature) {
        Ok(())
    } else {
        Err(AppError::InsufficientScope(format!(
            "Scope '{feature}' required"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ctx(scope: Scope) -> AuthContext {
        AuthContext {
            api_key_id: 1,
            label: "t".to_string(),
            scope,
            is_admin: scope == Scope::Admin,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    #[test]
    fn admin_guard_requires_exact_admin() {
        assert!(require_admin_scope(&ctx(Scope::Admin)).is_ok());
        assert!(matches!(
            require_admin_scope(&ctx(Scope::Write)),
            Err(AppError::InsufficientScope(_))
        ));
    }

    #[test]
    fn features_are_admin_only_by_default() {
        let grants = AdminOnlyGrants;
        assert!(require_feature(&grants, &ctx(Scope::Admin), "diagnostics").is_ok());
        assert!(require_feature(&grants, &ctx(Scope::Write), "diagnostics").is_err());
        assert!(!grants.has_feature(&ctx(Scope::Read), "assets:read"));
    }

    struct Table(&'static [(&'static str, Scope)]);

    impl FeatureGrants for Table {
        fn has_feature(&self, auth: &AuthContext, feature: &str) -> bool {
            self.0
                .iter()
                .any(|(name, scope)| *name == feature && auth.scope.satisfies(*scope))
        }
    }

    #[test]
    fn custom_grant_policy_plugs_in() {
        let grants = Table(&[("reports:export", Scope::Write)]);
        assert!(require_feature(&grants, &ctx(Scope::Write), "reports:export").is_ok());
        assert!(require_feature(&grants, &ctx(Scope::Read), "reports:export").is_err());
    }
}

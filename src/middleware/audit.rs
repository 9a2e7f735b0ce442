//! Audit middleware, the outermost pipeline stage.
//!
//! Every request under the protected namespace produces exactly one audit
//! entry, including requests rejected by authentication or authorization,
//! handlers that return errors, and handlers that panic.
//!
//! The rest of the pipeline runs on its own task. If the client goes away
//! mid-request the task keeps running, so store mutations complete and the
//! entry is still written. A panic inside the task is observed as a join
//! error and answered with a 500 envelope.

use std::sync::{Arc, OnceLock};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::{
    app::AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::audit::AuditRecord,
};

/// Per-request cell the authentication stage fills in.
///
/// The audit stage reads it after the inner stages finish, which works even
/// when they unwound instead of returning.
#[derive(Debug, Clone, Default)]
pub struct IdentitySlot(Arc<OnceLock<AuthContext>>);

impl IdentitySlot {
    pub fn set(&self, auth: AuthContext) {
        let _ = self.0.set(auth);
    }

    pub fn get(&self) -> Option<&AuthContext> {
        self.0.get()
    }
}

pub async fn audit_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if !state.routes.is_protected(&path) {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let slot = IdentitySlot::default();
    request.extensions_mut().insert(slot.clone());

    let audit = state.audit.clone();
    // Spawned tasks do not inherit the request span from the trace layer
    let span = tracing::Span::current();
    let inner = tokio::spawn(next.run(request).instrument(span.clone()));
    let pipeline = tokio::spawn(
        async move {
            let response = match inner.await {
                Ok(response) => response,
                Err(err) => {
                    tracing::error!(method = %method, path = %path, error = %err, "request handler failed");
                    AppError::Internal("request handler failed".to_string()).into_response()
                }
            };

            let identity = slot.get();
            let record = AuditRecord {
                api_key_id: identity.map(|auth| auth.api_key_id),
                scope: identity.map(|auth| auth.scope),
                method,
                path,
                status_code: response.status().as_u16(),
            };
            audit.record(&record).await;

            response
        }
        .instrument(span),
    );

    match pipeline.await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "audit task failed");
            AppError::Internal("audit task failed".to_string()).into_response()
        }
    }
}

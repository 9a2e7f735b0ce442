//! Test application setup utilities
//!
//! Builds the production router over an in-memory SQLite database, with a
//! bootstrap admin key already minted.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use fleet_ops_api::{
    app::{AppState, build_router},
    config::{DocumentStorageSettings, RouteSettings},
    db,
    middleware::auth::API_KEY_HEADER,
    models::{response::Page, scope::Scope},
    services::{bootstrap, hasher::CredentialHasher},
};

/// Iterations used by tests; production configs refuse anything this low.
const TEST_ITERATIONS: u32 = 1_000;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub admin_id: i64,
    pub admin_key: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn error_code(&self) -> Option<&str> {
        self.body["error"]["code"].as_str()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_documents(DocumentStorageSettings::default()).await
    }

    pub async fn with_documents(documents: DocumentStorageSettings) -> Self {
        let state = test_state(documents).await;
        Self::from_state(state).await
    }

    /// Build around a prepared state; mints the bootstrap admin.
    pub async fn from_state(state: AppState) -> Self {
        let admin = bootstrap::ensure_initial_admin(&state.keys)
            .await
            .expect("bootstrap admin")
            .expect("empty store mints an admin");

        Self {
            router: build_router(state.clone()),
            state,
            admin_id: admin.id,
            admin_key: admin.raw_secret,
        }
    }

    /// Mint a non-admin key directly through the store.
    pub async fn mint(&self, label: &str, scope: Scope) -> (i64, String) {
        let minted = self
            .state
            .keys
            .mint(label, false, scope)
            .await
            .expect("mint key");
        (minted.id, minted.raw_secret)
    }

    pub async fn get(&self, uri: &str, key: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, key, None).await
    }

    pub async fn post_json(&self, uri: &str, key: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, key, Some(body.to_string())).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        key: Option<&str>,
        body: Option<String>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        send_to(&self.router, request).await
    }

    /// All audit entries, newest first.
    pub async fn audit_entries(&self) -> Vec<fleet_ops_api::models::audit::AuditEntry> {
        let (entries, _) = self
            .state
            .audit
            .list(Page::new(Some(200), None))
            .await
            .expect("list audit entries");
        entries
    }
}

pub async fn test_state(documents: DocumentStorageSettings) -> AppState {
    let pool = db::create_pool("sqlite::memory:")
        .await
        .expect("Failed to initialize test database");
    let hasher = CredentialHasher::new(TEST_ITERATIONS);
    db::run_migrations(&pool, &hasher)
        .await
        .expect("Failed to run migrations");

    AppState::new(pool, hasher, RouteSettings::default(), documents)
}

pub async fn send_to(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    TestResponse { status, body }
}

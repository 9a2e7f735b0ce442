//! Fleet Operations API - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run the migration engine (schema, legacy key hashing, invariant repair)
//! 4. Mint the bootstrap admin key if no active key exists
//! 5. Build HTTP router with routes and the request pipeline
//! 6. Start server on configured port

use fleet_ops_api::{
    app::{AppState, build_router},
    config::Config,
    db,
    services::{bootstrap, hasher::CredentialHasher},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(prefix = %config.api_prefix, "Configuration loaded");

    let hasher = CredentialHasher::new(config.hash_iterations);

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations before accepting traffic
    let report = db::run_migrations(&pool, &hasher).await?;
    if report.is_noop() {
        tracing::info!("Database migrations complete");
    } else {
        tracing::info!(?report, "Database migrations applied repairs");
    }

    let state = AppState::new(pool, hasher, config.routing(), config.document_storage());

    // The raw bootstrap secret goes to stderr once and never through the log pipeline
    if let Some(minted) = bootstrap::ensure_initial_admin(&state.keys).await? {
        eprintln!(
            "Initial admin API key (id {}): {}\nStore it now; it will not be shown again.",
            minted.id, minted.raw_secret
        );
    }

    let app = build_router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

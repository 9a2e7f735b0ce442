//! Database connection pool and migration management.
//!
//! This module provides utilities for:
//! - Creating and managing a SQLite connection pool
//! - Running the startup migration engine
//! - Formatting timestamps the way every table stores them

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};

use crate::{
    error::AppError,
    services::{
        hasher::CredentialHasher,
        migration::{self, MigrationReport},
    },
};

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<Sqlite>;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a new SQLite connection pool.
///
/// # Configuration
///
/// - WAL journal with `synchronous = NORMAL`
/// - Busy timeout of 5 seconds so every store call is bounded
/// - Database file is created if missing
/// - In-memory databases get exactly one long-lived connection, since each
///   SQLite connection would otherwise see its own empty database
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the database
/// cannot be opened.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)?
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true)
        .create_if_missing(true);
    if !in_memory {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let mut pool_options = SqlitePoolOptions::new()
        // Limit concurrent connections
        .max_connections(if in_memory { 1 } else { 5 });
    if in_memory {
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }

    pool_options.connect_with(options).await
}

/// Run the startup migration engine.
///
/// Must complete before the server accepts traffic: legacy plaintext keys
/// only verify after they have been hashed.
pub async fn run_migrations(
    pool: &DbPool,
    hasher: &CredentialHasher,
) -> Result<MigrationReport, AppError> {
    migration::run(pool, hasher).await
}

/// Current time in the storage text format.
pub fn now() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

//! Startup migration engine.
//!
//! Safe, additive schema evolution. Every step checks the current shape of
//! the store before changing it, so running the engine against a store that
//! is already current (or running it twice) changes nothing.
//!
//! # Steps
//!
//! 1. Create missing tables
//! 2. Add missing columns (never drops any)
//! 3. Hash legacy plaintext API keys (rows with an empty salt)
//! 4. Repair admin flag / scope disagreements
//! 5. Deactivate all but the newest active admin key
//! 6. Create the single-active-admin partial unique index
//! 7. Collapse duplicate unresolved alerts
//! 8. Secondary indexes

use crate::{
    db::DbPool,
    error::AppError,
    services::hasher::CredentialHasher,
};

/// What a migration run changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub columns_added: u64,
    pub keys_hashed: u64,
    pub scopes_repaired: u64,
    pub admins_deactivated: u64,
    pub alerts_resolved: u64,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

const CREATE_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS api_keys (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        api_key TEXT NOT NULL UNIQUE,
        api_key_salt TEXT NOT NULL DEFAULT '',
        label TEXT NOT NULL DEFAULT 'default',
        is_active INTEGER NOT NULL DEFAULT 1,
        is_admin INTEGER NOT NULL DEFAULT 0,
        scope TEXT NOT NULL DEFAULT 'read',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        last_used_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        api_key_id INTEGER,
        scope TEXT,
        method TEXT NOT NULL,
        path TEXT NOT NULL,
        status_code INTEGER NOT NULL,
        success INTEGER NOT NULL DEFAULT 0,
        timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_id INTEGER NOT NULL,
        task TEXT,
        alert_type TEXT NOT NULL,
        severity TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        resolved INTEGER NOT NULL DEFAULT 0
    )
    "#,
];

/// Columns added to stores created by older releases.
///
/// SQLite refuses `ADD COLUMN` with a non-constant default, so time columns
/// are added nullable and backfilled below.
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("api_keys", "api_key_salt", "TEXT NOT NULL DEFAULT ''"),
    ("api_keys", "label", "TEXT NOT NULL DEFAULT 'default'"),
    ("api_keys", "is_active", "INTEGER NOT NULL DEFAULT 1"),
    ("api_keys", "is_admin", "INTEGER NOT NULL DEFAULT 0"),
    ("api_keys", "scope", "TEXT NOT NULL DEFAULT 'read'"),
    ("api_keys", "created_at", "TEXT"),
    ("api_keys", "last_used_at", "TEXT"),
    ("audit_logs", "api_key_id", "INTEGER"),
    ("audit_logs", "scope", "TEXT"),
    ("audit_logs", "timestamp", "TEXT"),
    ("alerts", "task", "TEXT"),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_api_keys_active ON api_keys(is_active)",
    "CREATE INDEX IF NOT EXISTS idx_api_keys_scope ON api_keys(scope)",
    "CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_logs(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_alerts_asset ON alerts(asset_id)",
    "CREATE INDEX IF NOT EXISTS idx_alerts_resolved ON alerts(resolved)",
];

/// Run every step in order.
pub async fn run(pool: &DbPool, hasher: &CredentialHasher) -> Result<MigrationReport, AppError> {
    let mut report = MigrationReport::default();

    for ddl in CREATE_TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }

    for (table, column, definition) in ADDED_COLUMNS {
        if add_column_if_missing(pool, table, column, definition).await? {
            report.columns_added += 1;
            backfill_added_column(pool, table, column).await?;
        }
    }

    report.keys_hashed = hash_legacy_keys(pool, hasher).await?;
    report.scopes_repaired = repair_admin_scopes(pool).await?;
    report.admins_deactivated = enforce_single_active_admin(pool).await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_api_keys_single_active_admin
        ON api_keys(is_admin)
        WHERE is_active = 1 AND is_admin = 1
        "#,
    )
    .execute(pool)
    .await?;

    report.alerts_resolved = dedupe_unresolved_alerts(pool).await?;

    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    if report.is_noop() {
        tracing::debug!("schema already current");
    } else {
        tracing::info!(?report, "schema migrated");
    }
    Ok(report)
}

async fn column_exists(pool: &DbPool, table: &str, column: &str) -> Result<bool, sqlx::Error> {
    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(pool)
        .await?;
    Ok(columns.iter().any(|c| c == column))
}

async fn add_column_if_missing(
    pool: &DbPool,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<bool, sqlx::Error> {
    if column_exists(pool, table, column).await? {
        return Ok(false);
    }
    let ddl = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
    sqlx::query(&ddl).execute(pool).await?;
    tracing::info!(table, column, "added column");
    Ok(true)
}

async fn backfill_added_column(pool: &DbPool, table: &str, column: &str) -> Result<(), sqlx::Error> {
    match (table, column) {
        ("api_keys", "created_at") => {
            sqlx::query("UPDATE api_keys SET created_at = CURRENT_TIMESTAMP WHERE created_at IS NULL")
                .execute(pool)
                .await?;
        }
        ("audit_logs", "timestamp") => {
            let sql = if column_exists(pool, "audit_logs", "created_at").await? {
                "UPDATE audit_logs SET timestamp = created_at WHERE timestamp IS NULL"
            } else {
                "UPDATE audit_logs SET timestamp = CURRENT_TIMESTAMP WHERE timestamp IS NULL"
            };
            sqlx::query(sql).execute(pool).await?;
        }
        _ => {}
    }
    Ok(())
}

/// Replace legacy plaintext keys with `hash(plaintext, fresh salt)`.
///
/// Only rows with an empty salt are touched, and the update re-checks that
/// condition, so a row is hashed exactly once.
async fn hash_legacy_keys(pool: &DbPool, hasher: &CredentialHasher) -> Result<u64, AppError> {
    let legacy: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT id, api_key FROM api_keys
        WHERE (api_key_salt IS NULL OR api_key_salt = '') AND api_key IS NOT NULL
        "#,
    )
    .fetch_all(pool)
    .await?;

    if legacy.is_empty() {
        return Ok(0);
    }

    let hasher = *hasher;
    let upgraded = tokio::task::spawn_blocking(move || {
        legacy
            .into_iter()
            .map(|(id, plaintext)| {
                let salt = CredentialHasher::new_salt();
                hasher
                    .hash(&plaintext, &salt)
                    .map(|digest| (id, salt, digest))
            })
            .collect::<Result<Vec<_>, AppError>>()
    })
    .await
    .map_err(|e| AppError::Internal(format!("legacy key hashing task failed: {e}")))??;

    let mut tx = pool.begin().await?;
    let mut hashed = 0;
    for (id, salt, digest) in upgraded {
        hashed += sqlx::query(
            r#"
            UPDATE api_keys SET api_key = ?, api_key_salt = ?
            WHERE id = ? AND (api_key_salt IS NULL OR api_key_salt = '')
            "#,
        )
        .bind(&digest)
        .bind(&salt)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }
    tx.commit().await?;

    tracing::info!(count = hashed, "hashed legacy api keys");
    Ok(hashed)
}

/// Make the admin flag and the scope agree again.
///
/// Known scopes are lowercased first. Admin rows get scope `admin`;
/// non-admin rows with scope `admin` or an unknown scope drop to `read`.
async fn repair_admin_scopes(pool: &DbPool) -> Result<u64, sqlx::Error> {
    let mut repaired = sqlx::query("UPDATE api_keys SET is_admin = 0 WHERE is_admin IS NULL")
        .execute(pool)
        .await?
        .rows_affected();

    // Same normalization `Scope` parsing applies (` WRITE ` is `write`)
    repaired += sqlx::query(
        r#"
        UPDATE api_keys SET scope = lower(trim(scope))
        WHERE scope != lower(trim(scope))
          AND lower(trim(scope)) IN ('read', 'write', 'admin')
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    repaired += sqlx::query(
        "UPDATE api_keys SET scope = 'admin' WHERE is_admin = 1 AND (scope IS NULL OR scope != 'admin')",
    )
    .execute(pool)
    .await?
    .rows_affected();

    repaired += sqlx::query(
        r#"
        UPDATE api_keys SET scope = 'read'
        WHERE is_admin = 0 AND (scope IS NULL OR scope NOT IN ('read', 'write'))
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    if repaired > 0 {
        tracing::warn!(count = repaired, "repaired admin/scope disagreements");
    }
    Ok(repaired)
}

/// Keep only the most recently created active admin.
async fn enforce_single_active_admin(pool: &DbPool) -> Result<u64, sqlx::Error> {
    let deactivated = sqlx::query(
        r#"
        UPDATE api_keys SET is_active = 0
        WHERE is_active = 1 AND is_admin = 1 AND id != (
            SELECT id FROM api_keys
            WHERE is_active = 1 AND is_admin = 1
            ORDER BY datetime(created_at) DESC, id DESC
            LIMIT 1
        )
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    if deactivated > 0 {
        tracing::warn!(count = deactivated, "deactivated duplicate admin keys");
    }
    Ok(deactivated)
}

/// Resolve all but the newest unresolved alert per (asset, task, type).
async fn dedupe_unresolved_alerts(pool: &DbPool) -> Result<u64, sqlx::Error> {
    let resolved = sqlx::query(
        r#"
        UPDATE alerts
        SET resolved = 1
        WHERE resolved = 0 AND id NOT IN (
            SELECT MAX(id)
            FROM alerts
            WHERE resolved = 0
            GROUP BY asset_id, task, alert_type
        )
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    Ok(resolved)
}

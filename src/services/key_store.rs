//! Credential store - persistent API key records.
//!
//! This service owns the credential invariants:
//! - at most one key is both active and admin
//! - a key is admin exactly when its scope is `admin`
//! - every key that can authenticate has a salt and a digest
//!
//! # Atomicity Guarantees
//!
//! Every admin-sensitive mutation is a single conditional SQL statement
//! (`INSERT … SELECT … WHERE NOT EXISTS`, `UPDATE … WHERE NOT EXISTS`), so
//! the "no other active admin" check and the write happen atomically
//! inside SQLite. The partial unique index created by the migration engine
//! backs this up: a racing writer that slips past the check fails with a
//! unique violation, which is reported as a conflict.

use crate::{
    db::{self, DbPool},
    error::AppError,
    models::{
        api_key::{ApiKey, ApiKeySummary, MintedKey},
        scope::Scope,
    },
    services::hasher::CredentialHasher,
};

pub const ONE_ADMIN_MESSAGE: &str = "Only one active admin key is allowed";
pub const ADMIN_SCOPE_MESSAGE: &str = "Admin scope requires is_admin=true";
pub const ADMIN_SCOPE_CHANGE_MESSAGE: &str = "Cannot change scope for admin key";
pub const NOT_FOUND_MESSAGE: &str = "API key not found";
pub const SELF_DEMOTION_MESSAGE: &str =
    "The active admin key cannot demote itself; hand admin over to another key instead";
pub const NOT_ACTIVE_ADMIN_MESSAGE: &str = "Caller is not the active admin key";
pub const INACTIVE_TARGET_MESSAGE: &str = "Cannot hand admin over to a revoked key";

const KEY_COLUMNS: &str =
    "id, api_key, api_key_salt, label, is_active, is_admin, scope, created_at, last_used_at";

#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    pool: DbPool,
    hasher: CredentialHasher,
}

impl ApiKeyStore {
    pub fn new(pool: DbPool, hasher: CredentialHasher) -> Self {
        Self { pool, hasher }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    /// Mint a new active key and return its raw secret.
    ///
    /// `want_admin` forces scope `admin`. Requesting scope `admin` without
    /// `want_admin`, or an admin key while another active admin exists, is
    /// a conflict and nothing is written.
    pub async fn mint(
        &self,
        label: &str,
        want_admin: bool,
        scope: Scope,
    ) -> Result<MintedKey, AppError> {
        if scope == Scope::Admin && !want_admin {
            return Err(AppError::Conflict(ADMIN_SCOPE_MESSAGE.to_string()));
        }
        let scope = if want_admin { Scope::Admin } else { scope };

        let raw_secret = CredentialHasher::generate_secret();
        let salt = CredentialHasher::new_salt();
        let digest = self.hash_blocking(raw_secret.clone(), salt.clone()).await?;
        let created_at = db::now();

        let inserted = if want_admin {
            sqlx::query(
                r#"
                INSERT INTO api_keys (api_key, api_key_salt, label, is_active, is_admin, scope, created_at)
                SELECT ?, ?, ?, 1, 1, 'admin', ?
                WHERE NOT EXISTS (
                    SELECT 1 FROM api_keys WHERE is_active = 1 AND is_admin = 1
                )
                "#,
            )
            .bind(&digest)
            .bind(&salt)
            .bind(label)
            .bind(&created_at)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                INSERT INTO api_keys (api_key, api_key_salt, label, is_active, is_admin, scope, created_at)
                VALUES (?, ?, ?, 1, 0, ?, ?)
                "#,
            )
            .bind(&digest)
            .bind(&salt)
            .bind(label)
            .bind(scope.as_str())
            .bind(&created_at)
            .execute(&self.pool)
            .await
        };
        let result = inserted.map_err(admin_conflict)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(ONE_ADMIN_MESSAGE.to_string()));
        }

        let id = result.last_insert_rowid();
        tracing::info!(api_key_id = id, scope = %scope, "api key minted");

        Ok(MintedKey { id, raw_secret })
    }

    /// Find the active key matching `raw_secret`.
    ///
    /// Every active candidate is hashed and compared, whether or not an
    /// earlier one already matched, so timing does not depend on which key
    /// was presented or where it sits in the table.
    pub async fn resolve(&self, raw_secret: &str) -> Result<Option<ApiKey>, AppError> {
        if raw_secret.is_empty() {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE is_active = 1 AND api_key_salt != ''"
        );
        let candidates = sqlx::query_as::<_, ApiKey>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let hasher = self.hasher;
        let secret = raw_secret.to_owned();
        tokio::task::spawn_blocking(move || {
            let mut matched = None;
            for candidate in candidates {
                let ok = hasher.verify(&secret, &candidate.salt, &candidate.key_hash);
                if ok && matched.is_none() {
                    matched = Some(candidate);
                }
            }
            matched
        })
        .await
        .map_err(|e| AppError::Internal(format!("credential verification task failed: {e}")))
    }

    /// Deactivate a key. Returns `false` when the id is unknown.
    pub async fn revoke(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE api_keys SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let revoked = result.rows_affected() > 0;
        if revoked {
            tracing::info!(api_key_id = id, "api key revoked");
        }
        Ok(revoked)
    }

    /// Change the scope of a non-admin key to `read` or `write`.
    pub async fn set_scope(&self, id: i64, scope: Scope) -> Result<(), AppError> {
        if scope == Scope::Admin {
            return Err(AppError::InvalidRequest(
                "Scope must be read or write".to_string(),
            ));
        }

        let result = sqlx::query("UPDATE api_keys SET scope = ? WHERE id = ? AND is_admin = 0")
            .bind(scope.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_or_conflict(id, ADMIN_SCOPE_CHANGE_MESSAGE).await);
        }

        tracing::info!(api_key_id = id, scope = %scope, "api key scope changed");
        Ok(())
    }

    /// Promote or demote a key.
    ///
    /// Promotion sets scope `admin` and fails with a conflict while another
    /// active admin exists. Promoting the current active admin again is a
    /// no-op. Demotion clears the admin flag and drops an `admin` scope to
    /// `read`.
    pub async fn set_admin(&self, id: i64, make_admin: bool) -> Result<(), AppError> {
        let result = if make_admin {
            sqlx::query(
                r#"
                UPDATE api_keys
                SET is_admin = 1, scope = 'admin'
                WHERE id = ?
                  AND NOT EXISTS (
                      SELECT 1 FROM api_keys
                      WHERE is_active = 1 AND is_admin = 1 AND id != ?
                  )
                "#,
            )
            .bind(id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(admin_conflict)?
        } else {
            sqlx::query(
                r#"
                UPDATE api_keys
                SET scope = CASE WHEN is_admin = 1 OR scope = 'admin' THEN 'read' ELSE scope END,
                    is_admin = 0
                WHERE id = ?
                "#,
            )
            .bind(id)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(self.missing_or_conflict(id, ONE_ADMIN_MESSAGE).await);
        }

        tracing::info!(api_key_id = id, is_admin = make_admin, "api key admin flag changed");
        Ok(())
    }

    /// Move the admin role from `from_id` to `to_id` in one transaction.
    ///
    /// `from_id` must be the active admin and `to_id` an active key. On
    /// success `to_id` is the only active admin and `from_id` drops to
    /// `read`. On any failure nothing changes.
    pub async fn hand_over_admin(&self, from_id: i64, to_id: i64) -> Result<(), AppError> {
        if from_id == to_id {
            return Err(AppError::InvalidRequest(
                "Cannot hand admin over to the same key".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let demoted = sqlx::query(
            r#"
            UPDATE api_keys
            SET is_admin = 0, scope = 'read'
            WHERE id = ? AND is_active = 1 AND is_admin = 1
            "#,
        )
        .bind(from_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if demoted == 0 {
            tx.rollback().await?;
            return Err(AppError::Conflict(NOT_ACTIVE_ADMIN_MESSAGE.to_string()));
        }

        let promoted = sqlx::query(
            "UPDATE api_keys SET is_admin = 1, scope = 'admin' WHERE id = ? AND is_active = 1",
        )
        .bind(to_id)
        .execute(&mut *tx)
        .await
        .map_err(admin_conflict)?
        .rows_affected();
        if promoted == 0 {
            tx.rollback().await?;
            return Err(self.missing_or_conflict(to_id, INACTIVE_TARGET_MESSAGE).await);
        }

        tx.commit().await?;

        tracing::info!(from = from_id, to = to_id, "admin role handed over");
        Ok(())
    }

    /// Record that a key was just used. Failures are logged and dropped.
    pub async fn touch_last_used(&self, id: i64) {
        let result = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(db::now())
            .bind(id)
            .execute(&self.pool)
            .await;

        if let Err(err) = result {
            tracing::warn!(api_key_id = id, error = %err, "failed to update last_used_at");
        }
    }

    pub async fn get(&self, id: i64) -> Result<Option<ApiKey>, AppError> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE id = ?");
        Ok(sqlx::query_as::<_, ApiKey>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Keys newest first, without secrets.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<ApiKeySummary>, AppError> {
        let filter = if include_inactive {
            ""
        } else {
            "WHERE is_active = 1"
        };
        let sql = format!("SELECT {KEY_COLUMNS} FROM api_keys {filter} ORDER BY id DESC");
        let keys = sqlx::query_as::<_, ApiKey>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(keys.into_iter().map(Into::into).collect())
    }

    pub async fn count_active(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM api_keys WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn active_admin_count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM api_keys WHERE is_active = 1 AND is_admin = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn hash_blocking(&self, secret: String, salt: String) -> Result<String, AppError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(&secret, &salt))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
    }

    /// Explain why a conditional update touched no rows.
    async fn missing_or_conflict(&self, id: i64, conflict: &str) -> AppError {
        match self.get(id).await {
            Ok(Some(_)) => AppError::Conflict(conflict.to_string()),
            Ok(None) => AppError::NotFound(NOT_FOUND_MESSAGE.to_string()),
            Err(err) => err,
        }
    }
}

/// A unique violation can only come from the single-active-admin index.
fn admin_conflict(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(ONE_ADMIN_MESSAGE.to_string())
        }
        _ => AppError::Database(err),
    }
}

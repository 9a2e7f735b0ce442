//! Append-only audit trail of protected requests.
//!
//! Entries are inserted once and never updated or deleted here.

use crate::{
    db::{self, DbPool},
    error::AppError,
    models::{
        audit::{AuditEntry, AuditRecord},
        response::Page,
    },
};

#[derive(Debug, Clone)]
pub struct AuditLog {
    pool: DbPool,
}

impl AuditLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: &AuditRecord) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (api_key_id, scope, method, path, status_code, success, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.api_key_id)
        .bind(record.scope.map(|s| s.as_str()))
        .bind(&record.method)
        .bind(&record.path)
        .bind(i64::from(record.status_code))
        .bind(record.success())
        .bind(db::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Best-effort insert. A failed write is logged and never reaches the
    /// caller.
    pub async fn record(&self, record: &AuditRecord) {
        if let Err(err) = self.insert(record).await {
            tracing::warn!(
                error = %err,
                method = %record.method,
                path = %record.path,
                status = record.status_code,
                "failed to write audit entry"
            );
        }
    }

    /// Newest first, with the total entry count.
    pub async fn list(&self, page: Page) -> Result<(Vec<AuditEntry>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM audit_logs")
            .fetch_one(&self.pool)
            .await?;

        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, api_key_id, scope, method, path, status_code, success, timestamp
            FROM audit_logs
            ORDER BY datetime(timestamp) DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((entries, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::scope::Scope,
        services::{hasher::CredentialHasher, migration},
    };

    async fn audit_log() -> AuditLog {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        migration::run(&pool, &CredentialHasher::new(1_000))
            .await
            .unwrap();
        AuditLog::new(pool)
    }

    fn record(path: &str, status_code: u16, api_key_id: Option<i64>) -> AuditRecord {
        AuditRecord {
            api_key_id,
            scope: api_key_id.map(|_| Scope::Read),
            method: "GET".to_string(),
            path: path.to_string(),
            status_code,
        }
    }

    #[tokio::test]
    async fn success_flag_follows_status() {
        let log = audit_log().await;
        log.record(&record("/v1/whoami", 200, Some(1))).await;
        log.record(&record("/v1/whoami", 401, None)).await;

        let (entries, total) = log.list(Page::new(None, None)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(entries[0].status_code, 401);
        assert!(!entries[0].success);
        assert_eq!(entries[0].api_key_id, None);
        assert_eq!(entries[0].scope, None);
        assert!(entries[1].success);
        assert_eq!(entries[1].scope.as_deref(), Some("read"));
    }

    #[tokio::test]
    async fn list_is_paginated_newest_first() {
        let log = audit_log().await;
        for i in 0..5 {
            log.record(&record(&format!("/v1/item/{i}"), 200, Some(1))).await;
        }

        let (first, total) = log.list(Page::new(Some(2), Some(0))).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(
            first.iter().map(|e| e.path.as_str()).collect::<Vec<_>>(),
            vec!["/v1/item/4", "/v1/item/3"]
        );

        let (last, _) = log.list(Page::new(Some(2), Some(4))).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].path, "/v1/item/0");
    }
}

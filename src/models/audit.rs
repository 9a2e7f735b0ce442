//! Audit log entries.
//!
//! One entry is written per request to the protected namespace, whatever
//! its outcome. Entries are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::scope::Scope;

/// A stored audit entry.
///
/// `api_key_id` and `scope` are `None` when the request failed before an
/// identity was resolved.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub api_key_id: Option<i64>,
    pub scope: Option<String>,
    pub method: String,
    pub path: String,
    pub status_code: i64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Everything the pipeline knows about a finished request.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub api_key_id: Option<i64>,
    pub scope: Option<Scope>,
    pub method: String,
    pub path: String,
    pub status_code: u16,
}

impl AuditRecord {
    pub fn success(&self) -> bool {
        self.status_code < 400
    }
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

//! API Key model for authentication.
//!
//! API keys authenticate clients of the API. Only a salted PBKDF2 digest of
//! each key is stored; the raw key is shown once when minted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::scope::Scope;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table. Column names are kept from the legacy
/// schema so that stores created before hashing was introduced can be
/// upgraded in place:
/// - `api_key`: hex PBKDF2 digest (plaintext on legacy rows until migrated)
/// - `api_key_salt`: hex salt, empty on legacy rows until migrated
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: i64,

    #[sqlx(rename = "api_key")]
    pub key_hash: String,

    #[sqlx(rename = "api_key_salt")]
    pub salt: String,

    pub label: String,

    /// Inactive keys are rejected during authentication. Revocation is
    /// permanent.
    pub is_active: bool,

    pub is_admin: bool,

    #[sqlx(try_from = "String")]
    pub scope: Scope,

    pub created_at: DateTime<Utc>,

    pub last_used_at: Option<DateTime<Utc>>,
}

/// Public view of a key. Never carries the digest or salt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiKeySummary {
    pub id: i64,
    pub label: String,
    pub scope: Scope,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<&ApiKey> for ApiKeySummary {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id,
            label: key.label.clone(),
            scope: key.scope,
            is_admin: key.is_admin,
            is_active: key.is_active,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
        }
    }
}

impl From<ApiKey> for ApiKeySummary {
    fn from(key: ApiKey) -> Self {
        Self::from(&key)
    }
}

/// A freshly minted key. `raw_secret` exists only in this value.
#[derive(Clone)]
pub struct MintedKey {
    pub id: i64,
    pub raw_secret: String,
}

impl fmt::Debug for MintedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MintedKey")
            .field("id", &self.id)
            .field("raw_secret", &"<redacted>")
            .finish()
    }
}

fn default_label() -> String {
    "default".to_string()
}

fn default_scope() -> String {
    "read".to_string()
}

/// Body of `POST /v1/admin/api-keys`.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    #[serde(default = "default_label")]
    pub label: String,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default = "default_scope")]
    pub scope: String,
}

/// Response of `POST /v1/admin/api-keys`. The only place a raw key is
/// ever returned.
#[derive(Debug, Serialize)]
pub struct CreatedApiKeyResponse {
    pub id: i64,
    pub api_key: String,
    pub label: String,
    pub scope: Scope,
    pub is_admin: bool,
}

/// Body of `POST /v1/admin/api-keys/{id}/scope`.
#[derive(Debug, Deserialize)]
pub struct UpdateScopeRequest {
    pub scope: String,
}

/// Body of `POST /v1/admin/api-keys/{id}/admin`.
#[derive(Debug, Deserialize)]
pub struct UpdateAdminRequest {
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListApiKeysQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_key_debug_hides_secret() {
        let minted = MintedKey {
            id: 7,
            raw_secret: "deadbeef".to_string(),
        };
        let rendered = format!("{minted:?}");
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("deadbeef"));
    }

    #[test]
    fn create_request_defaults() {
        let req: CreateApiKeyRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.label, "default");
        assert_eq!(req.scope, "read");
        assert!(!req.is_admin);
    }
}

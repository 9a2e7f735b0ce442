//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a
//! type-safe struct, then validates the values that carry security
//! requirements.

use serde::Deserialize;

use crate::services::hasher::MIN_HASH_ITERATIONS;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): SQLite connection string, defaults to `sqlite://fleet.db`
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `API_PREFIX` (optional): protected namespace, defaults to `/v1/`
/// - `HASH_ITERATIONS` (optional): PBKDF2 rounds, defaults to 200000 (lower values are rejected)
/// - `DOC_ENCRYPTION_ENABLED` (optional): document storage encryption flag, defaults to false
/// - `DOCS_DIR` (optional): document storage directory, defaults to `docs_store`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,

    #[serde(default)]
    pub doc_encryption_enabled: bool,

    #[serde(default = "default_docs_dir")]
    pub docs_dir: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_database_url() -> String {
    "sqlite://fleet.db".to_string()
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_api_prefix() -> String {
    "/v1/".to_string()
}

fn default_hash_iterations() -> u32 {
    MIN_HASH_ITERATIONS
}

fn default_docs_dir() -> String {
    "docs_store".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Environment variable values cannot be parsed into expected types
    /// - `HASH_ITERATIONS` is below the minimum
    /// - `API_PREFIX` is `/` or does not start and end with `/`
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        let config = envy::from_env::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_iterations < MIN_HASH_ITERATIONS {
            return Err(ConfigError::Invalid(format!(
                "HASH_ITERATIONS must be at least {MIN_HASH_ITERATIONS}"
            )));
        }
        if self.api_prefix.len() < 2
            || !self.api_prefix.starts_with('/')
            || !self.api_prefix.ends_with('/')
        {
            return Err(ConfigError::Invalid(
                "API_PREFIX must start and end with '/'".to_string(),
            ));
        }
        Ok(())
    }

    /// Path layout of the protected surface.
    pub fn routing(&self) -> RouteSettings {
        RouteSettings::new(&self.api_prefix)
    }

    pub fn document_storage(&self) -> DocumentStorageSettings {
        DocumentStorageSettings {
            encryption_enabled: self.doc_encryption_enabled,
            docs_dir: self.docs_dir.clone(),
        }
    }
}

/// Which paths pass through the request pipeline.
///
/// Everything under `prefix` is protected except the liveness probe at
/// `<prefix>health`. Paths under `<prefix>admin/` skip the generic
/// authorization stage; their handlers check admin scope themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSettings {
    pub prefix: String,
    pub health_path: String,
    pub admin_prefix: String,
}

impl RouteSettings {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            health_path: format!("{prefix}health"),
            admin_prefix: format!("{prefix}admin/"),
        }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        path.starts_with(&self.prefix) && path != self.health_path
    }

    pub fn is_admin(&self, path: &str) -> bool {
        path.starts_with(&self.admin_prefix)
    }
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self::new(&default_api_prefix())
    }
}

/// Configuration handed to the document-storage collaborator at
/// construction time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DocumentStorageSettings {
    pub encryption_enabled: bool,
    pub docs_dir: String,
}

impl Default for DocumentStorageSettings {
    fn default() -> Self {
        Self {
            encryption_enabled: false,
            docs_dir: default_docs_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: default_database_url(),
            server_port: default_port(),
            api_prefix: default_api_prefix(),
            hash_iterations: default_hash_iterations(),
            doc_encryption_enabled: false,
            docs_dir: default_docs_dir(),
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn weak_iteration_count_is_rejected() {
        let mut cfg = config();
        cfg.hash_iterations = 1_000;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn prefix_must_be_slash_delimited() {
        let mut cfg = config();
        cfg.api_prefix = "/v1".to_string();
        assert!(cfg.validate().is_err());
        cfg.api_prefix = "/".to_string();
        assert!(cfg.validate().is_err());
        cfg.api_prefix = "/api/v2/".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn protected_paths() {
        let routes = RouteSettings::default();
        assert!(routes.is_protected("/v1/whoami"));
        assert!(routes.is_protected("/v1/admin/api-keys"));
        assert!(!routes.is_protected("/v1/health"));
        assert!(!routes.is_protected("/metrics"));
        assert!(routes.is_admin("/v1/admin/audit-logs"));
        assert!(!routes.is_admin("/v1/whoami"));
    }
}

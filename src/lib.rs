//! Fleet operations API - credential and authorization core.
//!
//! API keys are minted with a random secret and stored only as a salted
//! PBKDF2 digest. Every request under the API prefix runs through the
//! pipeline audit → authenticate → authorize before reaching its handler.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: SQLite with sqlx (async queries)
//! - **Authentication**: `X-API-Key` header, PBKDF2-HMAC-SHA256 digests
//! - **Format**: JSON envelope `{ data, meta, error }`

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

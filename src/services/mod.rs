//! Core services: credential hashing and storage, audit trail, startup
//! migration and bootstrap.

pub mod audit_log;
pub mod bootstrap;
pub mod hasher;
pub mod key_store;
pub mod migration;

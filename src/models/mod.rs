//! Data models representing database entities and wire types.

/// API key (credential) model
pub mod api_key;
/// Audit log entries
pub mod audit;
/// Response envelope and pagination
pub mod response;
/// Capability tiers
pub mod scope;

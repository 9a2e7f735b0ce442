//! First-run admin key.
//!
//! The only path that mints an admin key without an admin caller.

use crate::{
    error::AppError,
    models::{api_key::MintedKey, scope::Scope},
    services::key_store::ApiKeyStore,
};

pub const BOOTSTRAP_LABEL: &str = "default";

/// Mint an admin key when the store has no active key at all.
///
/// Returns the minted key so the caller can show the raw secret to the
/// operator once. Returns `None` when any active key already exists.
pub async fn ensure_initial_admin(store: &ApiKeyStore) -> Result<Option<MintedKey>, AppError> {
    if store.count_active().await? > 0 {
        return Ok(None);
    }

    let minted = store.mint(BOOTSTRAP_LABEL, true, Scope::Admin).await?;
    tracing::warn!(api_key_id = minted.id, "no active api key found, minted bootstrap admin key");
    Ok(Some(minted))
}

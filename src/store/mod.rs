//! Key Store
//!
//! Owns every persisted [`DerivedKeyInfo`] and [`SharedSecret`]. Derived
//! keys are keyed by owner public key; shared secrets by
//! `(owner, counterparty)`. A missing record is `Ok(None)`, never an error;
//! errors always mean the backend could not be read or written.

mod ephemeral;
mod persistent;

pub use ephemeral::*;
pub use persistent::*;

use crate::error::IdentityResult;
use crate::types::{DerivedKeyInfo, SharedSecret};

pub trait KeyStore: Send + Sync {
    /// Insert or replace the derived key of `info.owner_public_key`
    fn store_derived_key_info(&self, info: &DerivedKeyInfo) -> IdentityResult<()>;

    fn derived_key_info(&self, owner_public_key: &str) -> IdentityResult<Option<DerivedKeyInfo>>;

    fn clear_derived_key_info(&self, owner_public_key: &str) -> IdentityResult<()>;

    /// Owners with a stored derived key, sorted
    fn owner_public_keys(&self) -> IdentityResult<Vec<String>>;

    /// Insert or replace the secret for `(secret.public_key, secret.other_public_key)`
    fn store_shared_secret(&self, secret: &SharedSecret) -> IdentityResult<()>;

    fn shared_secret(&self, owner_public_key: &str, other_public_key: &str) -> IdentityResult<Option<SharedSecret>>;

    fn clear_shared_secret(&self, owner_public_key: &str, other_public_key: &str) -> IdentityResult<()>;

    fn clear_all_shared_secrets(&self, owner_public_key: &str) -> IdentityResult<()>;

    fn all_shared_secrets(&self) -> IdentityResult<Vec<SharedSecret>>;

    /// Remove every derived key and shared secret
    fn clear_all(&self) -> IdentityResult<()>;
}

fn same_conversation(secret: &SharedSecret, owner_public_key: &str, other_public_key: &str) -> bool {
    secret.public_key == owner_public_key && secret.other_public_key == other_public_key
}

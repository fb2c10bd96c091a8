//! DeSo Node API
//!
//! The backend collaborator: typed remote procedures against a DeSo node.
//! [`HttpNodeClient`] talks to a real node over HTTPS; tests substitute
//! their own [`NodeApi`] implementations.

mod client;
mod types;

pub use client::*;
pub use types::*;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::IdentityResult;
use crate::types::OnChainDerivedKey;

#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Current chain height
    async fn block_height(&self) -> IdentityResult<u64>;

    /// Spendable balance of `public_key` in nanos
    async fn balance_nanos(&self, public_key: &str) -> IdentityResult<u64>;

    /// On-chain record of `derived_public_key` under `owner_public_key`,
    /// `None` when the node has never seen it
    async fn derived_key(
        &self,
        owner_public_key: &str,
        derived_public_key: &str,
    ) -> IdentityResult<Option<OnChainDerivedKey>>;

    /// Re-serialize a transaction with extra data merged in
    async fn append_extra_data(
        &self,
        transaction_hex: &str,
        extra_data: &HashMap<String, String>,
    ) -> IdentityResult<String>;

    /// Broadcast a signed transaction, returning its hash
    async fn submit_transaction(&self, signed_transaction_hex: &str) -> IdentityResult<String>;

    /// Build the transaction registering (or deleting) a derived key
    async fn authorize_derived_key(
        &self,
        request: &AuthorizeDerivedKeyRequest,
    ) -> IdentityResult<AuthorizeDerivedKeyResponse>;
}

//! Request and response bodies of the node's `/api/v0/` endpoints

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{DerivedKeyInfo, OnChainDerivedKey};

// =============================================================================
// Chain State
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppStateRequest {
    pub public_key_base58_check: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppStateResponse {
    pub block_height: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UsersStatelessRequest {
    pub public_keys_base58_check: Vec<String>,
    pub skip_for_leaderboard: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UsersStatelessResponse {
    #[serde(default)]
    pub user_list: Option<Vec<UserEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserEntry {
    pub public_key_base58_check: String,
    #[serde(default)]
    pub balance_nanos: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDerivedKeysRequest {
    pub public_key_base58_check: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDerivedKeysResponse {
    /// Keyed by derived public key
    #[serde(default)]
    pub derived_keys: Option<HashMap<String, UserDerivedKey>>,
}

impl UserDerivedKeysResponse {
    pub fn derived_key(&self, derived_public_key: &str) -> Option<&UserDerivedKey> {
        self.derived_keys.as_ref()?.get(derived_public_key)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDerivedKey {
    pub owner_public_key_base58_check: String,
    pub derived_public_key_base58_check: String,
    pub expiration_block: u64,
    pub is_valid: bool,
}

impl From<&UserDerivedKey> for OnChainDerivedKey {
    fn from(key: &UserDerivedKey) -> Self {
        OnChainDerivedKey {
            owner_public_key: key.owner_public_key_base58_check.clone(),
            derived_public_key: key.derived_public_key_base58_check.clone(),
            expiration_block: key.expiration_block,
            is_valid: key.is_valid,
        }
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppendExtraDataRequest<'a> {
    pub transaction_hex: &'a str,
    pub extra_data: &'a HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionHexResponse {
    pub transaction_hex: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmitTransactionRequest<'a> {
    pub transaction_hex: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmitTransactionResponse {
    pub txn_hash_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorizeDerivedKeyRequest {
    pub owner_public_key_base58_check: String,
    pub derived_public_key_base58_check: String,
    pub expiration_block: u64,
    pub access_signature: String,
    pub delete_key: bool,
    pub derived_key_signature: bool,
    #[serde(rename = "MinFeeRateNanosPerKB")]
    pub min_fee_rate_nanos_per_kb: u64,
}

impl AuthorizeDerivedKeyRequest {
    /// Request signed by the derived key itself
    pub fn from_derived_key_info(info: &DerivedKeyInfo, delete_key: bool, min_fee_rate_nanos_per_kb: u64) -> Self {
        Self {
            owner_public_key_base58_check: info.owner_public_key.clone(),
            derived_public_key_base58_check: info.derived_public_key.clone(),
            expiration_block: info.expiration_block,
            access_signature: info.access_signature.clone(),
            delete_key,
            derived_key_signature: true,
            min_fee_rate_nanos_per_kb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorizeDerivedKeyResponse {
    pub spend_amount_nanos: u64,
    pub total_input_nanos: u64,
    pub change_amount_nanos: u64,
    pub fee_nanos: u64,
    pub transaction_hex: String,
    pub txn_hash_hex: String,
}

/// Body of a non-200 node response
#[derive(Debug, Clone, Deserialize)]
pub struct BackendErrorResponse {
    pub error: String,
}

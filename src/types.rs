//! Shared types for DeSo Identity
//!
//! All data structures that cross module boundaries are defined here
//! for consistent serialization and FFI compatibility.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{base58, secp256k1};
use crate::error::{IdentityError, IdentityResult};

// =============================================================================
// Network
// =============================================================================

/// DeSo network a derived key was issued on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Base58Check prefix of a DeSo public key on this network
    pub fn public_key_prefix(&self) -> [u8; 3] {
        match self {
            Network::Mainnet => [0xcd, 0x14, 0x00],
            Network::Testnet => [0x11, 0xc2, 0x00],
        }
    }

    pub fn default_node_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://node.deso.org",
            Network::Testnet => "https://test.deso.org",
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Key Material
// =============================================================================

/// A derived key issued by the identity service on behalf of an owner key.
///
/// Immutable once issued; one per (owner, network) pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedKeyInfo {
    /// Base58Check owner ("true") public key
    #[serde(rename = "publicKey")]
    pub owner_public_key: String,
    /// Base58Check public key of the derived key
    pub derived_public_key: String,
    /// Hex scalar of the derived private key
    pub derived_seed_hex: String,
    pub btc_deposit_address: String,
    pub expiration_block: u64,
    pub access_signature: String,
    pub network: Network,
    pub jwt: String,
    pub derived_jwt: String,
}

impl DerivedKeyInfo {
    /// Check that the seed is a usable scalar and that `derived_public_key`
    /// is the point derived from it.
    pub fn validate(&self, prefix_len: usize) -> IdentityResult<()> {
        let scalar = parse_seed_hex(&self.derived_seed_hex)?;
        let (_, payload) = base58::decode_with_prefix(&self.derived_public_key, prefix_len)?;

        let matches = match payload.len() {
            33 => secp256k1::compressed_public_key_from_private(scalar.as_slice())?[..] == payload[..],
            65 => secp256k1::public_key_from_private(scalar.as_slice())?[..] == payload[..],
            _ => false,
        };

        if matches {
            Ok(())
        } else {
            Err(IdentityError::BadPublicKey)
        }
    }
}

impl std::fmt::Debug for DerivedKeyInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyInfo")
            .field("owner_public_key", &self.owner_public_key)
            .field("derived_public_key", &self.derived_public_key)
            .field("derived_seed_hex", &"[REDACTED]")
            .field("btc_deposit_address", &self.btc_deposit_address)
            .field("expiration_block", &self.expiration_block)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Parse a hex big integer into a 32-byte big-endian scalar.
///
/// Odd-length input is accepted. Leading zero bytes are dropped before the
/// length check, so `"01"` and `"0000…01"` name the same scalar. Range
/// checking against the curve order happens when the scalar is used.
pub fn parse_seed_hex(seed_hex: &str) -> IdentityResult<Zeroizing<[u8; 32]>> {
    let trimmed = seed_hex.trim().trim_start_matches("0x");
    if trimmed.is_empty() {
        return Err(IdentityError::BadPrivateKey);
    }

    let padded = if trimmed.len() % 2 == 1 {
        Zeroizing::new(format!("0{}", trimmed))
    } else {
        Zeroizing::new(trimmed.to_string())
    };

    let bytes = Zeroizing::new(hex::decode(padded.as_str()).map_err(|_| IdentityError::BadPrivateKey)?);
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let magnitude = &bytes[first_nonzero..];
    if magnitude.len() > 32 {
        return Err(IdentityError::BadPrivateKey);
    }

    let mut scalar = Zeroizing::new([0u8; 32]);
    scalar[32 - magnitude.len()..].copy_from_slice(magnitude);
    Ok(scalar)
}

/// Per-conversation secret obtained from the identity service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedSecret {
    /// Hex private key of the conversation
    pub secret: String,
    /// Owner public key
    pub public_key: String,
    /// Counterparty public key
    pub other_public_key: String,
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("secret", &"[REDACTED]")
            .field("public_key", &self.public_key)
            .field("other_public_key", &self.other_public_key)
            .finish()
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A single encrypted direct message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedText {
    /// Hex ECIES payload
    pub message: String,
    /// `true` for the standard (unpadded) cipher mode
    pub v2: bool,
}

impl EncryptedText {
    pub fn new(message: impl Into<String>, v2: bool) -> Self {
        Self {
            message: message.into(),
            v2,
        }
    }
}

/// A conversation between the owner and one counterparty, in send order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedMessagesThread {
    pub public_key: String,
    pub other_public_key: String,
    pub encrypted_messages: Vec<EncryptedText>,
}

// =============================================================================
// Transactions
// =============================================================================

/// A serialized transaction whose final byte is a signature-length placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub public_key: String,
    pub transaction_hex: String,
}

impl UnsignedTransaction {
    pub fn new(public_key: impl Into<String>, transaction_hex: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            transaction_hex: transaction_hex.into(),
        }
    }
}

// =============================================================================
// Authorization
// =============================================================================

/// On-chain record of a derived key as reported by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainDerivedKey {
    pub owner_public_key: String,
    pub derived_public_key: String,
    pub expiration_block: u64,
    pub is_valid: bool,
}

/// Remote facts the login decision is evaluated against. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationFacts {
    pub current_block_height: u64,
    pub account_balance_nanos: u64,
    /// `None` when the node has no record of the stored derived key
    pub derived_key: Option<OnChainDerivedKey>,
}

/// Outcome of checking whether a stored derived key may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginState {
    Authorized,
    NotAuthorized,
    ExpiredAuthorization,
    InsufficientBalanceForAuthorization,
}

impl LoginState {
    pub fn is_authorized(&self) -> bool {
        matches!(self, LoginState::Authorized)
    }
}

/// Result of a completed login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub selected_public_key: String,
    pub all_loaded_public_keys: Vec<String>,
    pub login_state: LoginState,
}

// =============================================================================
// API Response (FFI)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<crate::error::ErrorPayload>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: IdentityError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_payload()),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":{"code":"invalid_format","message":"Serialization failed"}}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_prefixes() {
        assert_eq!(Network::Mainnet.public_key_prefix(), [0xcd, 0x14, 0x00]);
        assert_eq!(Network::Testnet.public_key_prefix(), [0x11, 0xc2, 0x00]);
        assert!(Network::Testnet.is_testnet());
        assert_eq!(Network::default(), Network::Mainnet);
    }

    #[test]
    fn test_parse_seed_hex() {
        let one = parse_seed_hex("1").unwrap();
        assert_eq!(one[31], 1);
        assert!(one[..31].iter().all(|b| *b == 0));

        let padded = parse_seed_hex(&format!("00{}", "ab".repeat(32))).unwrap();
        assert_eq!(padded.as_slice(), [0xab; 32].as_slice());

        assert_eq!(parse_seed_hex(""), Err(IdentityError::BadPrivateKey));
        assert_eq!(parse_seed_hex("xyz"), Err(IdentityError::BadPrivateKey));
        assert_eq!(parse_seed_hex(&"ff".repeat(33)), Err(IdentityError::BadPrivateKey));
    }

    #[test]
    fn test_derived_key_info_debug_redacts_seed() {
        let info = DerivedKeyInfo {
            owner_public_key: "owner".into(),
            derived_public_key: "derived".into(),
            derived_seed_hex: "deadbeef".into(),
            btc_deposit_address: "btc".into(),
            expiration_block: 10,
            access_signature: "sig".into(),
            network: Network::Mainnet,
            jwt: "jwt".into(),
            derived_jwt: "djwt".into(),
        };
        let debug = format!("{:?}", info);
        assert!(!debug.contains("deadbeef"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_api_response_serialization() {
        let response = ApiResponse::ok("signed".to_string());
        let json = response.to_json();
        assert!(json.contains("success"));
        assert!(json.contains("signed"));

        let failed: ApiResponse<()> = ApiResponse::err(IdentityError::ChecksumError);
        assert!(failed.to_json().contains("checksum_error"));
    }
}

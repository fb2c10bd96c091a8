//! Unified error types for DeSo Identity
//!
//! Every fallible operation in the crate returns [`IdentityResult`]. The
//! variants mirror the failure classes callers need to tell apart: crypto
//! validation, Base58Check integrity, storage, remote reads and timeouts.
//! Each variant maps onto a serialisable [`ErrorCode`] for the FFI envelope.

use serde::{Deserialize, Serialize};

use crate::types::LoginState;

/// Main error type for all identity operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    // Crypto errors
    #[error("Bad private key")]
    BadPrivateKey,

    #[error("Bad public key")]
    BadPublicKey,

    #[error("Bad signature")]
    BadSignature,

    #[error("Message to sign is empty")]
    EmptyMessage,

    #[error("Message to sign is longer than 32 bytes")]
    MessageTooLong,

    #[error("Invalid cipher text: {0}")]
    InvalidCipherText(String),

    #[error("Incorrect MAC")]
    IncorrectMAC,

    // Base58Check errors
    #[error("Invalid Base58Check format")]
    InvalidFormat,

    #[error("Base58Check checksum mismatch")]
    ChecksumError,

    // Input errors
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Key material lookups
    #[error("No derived key info found for {0}")]
    NoDerivedKeyInfoFound(String),

    #[error("Missing shared secret between {owner} and {other}")]
    MissingSharedSecret { owner: String, other: String },

    #[error("Derived key is not usable: {0:?}")]
    NotAuthorized(LoginState),

    // Collaborator failures
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Remote read failed: {0}")]
    RemoteReadFailed(String),

    #[error("Authorization handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl IdentityError {
    /// Error code used when the error crosses the FFI boundary
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::BadPrivateKey => ErrorCode::BadPrivateKey,
            Self::BadPublicKey => ErrorCode::BadPublicKey,
            Self::BadSignature => ErrorCode::BadSignature,
            Self::EmptyMessage => ErrorCode::EmptyMessage,
            Self::MessageTooLong => ErrorCode::MessageTooLong,
            Self::InvalidCipherText(_) => ErrorCode::InvalidCipherText,
            Self::IncorrectMAC => ErrorCode::IncorrectMac,
            Self::InvalidFormat => ErrorCode::InvalidFormat,
            Self::ChecksumError => ErrorCode::ChecksumError,
            Self::InvalidHex(_) => ErrorCode::InvalidHex,
            Self::InvalidTransaction(_) => ErrorCode::InvalidTransaction,
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::NoDerivedKeyInfoFound(_) => ErrorCode::NoDerivedKeyInfoFound,
            Self::MissingSharedSecret { .. } => ErrorCode::MissingSharedSecret,
            Self::NotAuthorized(_) => ErrorCode::NotAuthorized,
            Self::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
            Self::RemoteReadFailed(_) => ErrorCode::RemoteReadFailed,
            Self::HandshakeFailed(_) => ErrorCode::HandshakeFailed,
            Self::Timeout(_) => ErrorCode::Timeout,
        }
    }

    /// Authentication failures: the input was tampered with or corrupted.
    /// Retrying these can never succeed.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::IncorrectMAC | Self::ChecksumError | Self::BadSignature
        )
    }

    /// Serialisable view of this error for JSON responses
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Crypto errors
    BadPrivateKey,
    BadPublicKey,
    BadSignature,
    EmptyMessage,
    MessageTooLong,
    InvalidCipherText,
    IncorrectMac,

    // Base58Check errors
    InvalidFormat,
    ChecksumError,

    // Input errors
    InvalidHex,
    InvalidTransaction,
    InvalidConfig,
    InvalidInput,

    // Lookup / state errors
    NoDerivedKeyInfoFound,
    MissingSharedSecret,
    NotAuthorized,

    // Collaborator errors
    StorageUnavailable,
    RemoteReadFailed,
    HandshakeFailed,
    Timeout,
}

/// JSON shape of an error inside an `ApiResponse`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

/// Result type alias for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;

// Conversions from common error types

impl From<hex::FromHexError> for IdentityError {
    fn from(e: hex::FromHexError) -> Self {
        IdentityError::InvalidHex(e.to_string())
    }
}

impl From<secp256k1::Error> for IdentityError {
    fn from(e: secp256k1::Error) -> Self {
        match e {
            secp256k1::Error::InvalidPublicKey => IdentityError::BadPublicKey,
            secp256k1::Error::InvalidSignature | secp256k1::Error::IncorrectSignature => {
                IdentityError::BadSignature
            }
            _ => IdentityError::BadPrivateKey,
        }
    }
}

impl From<std::io::Error> for IdentityError {
    fn from(e: std::io::Error) -> Self {
        IdentityError::StorageUnavailable(e.to_string())
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IdentityError::Timeout("Request timed out".to_string())
        } else if e.is_connect() {
            IdentityError::RemoteReadFailed("Connection failed".to_string())
        } else {
            IdentityError::RemoteReadFailed(e.to_string())
        }
    }
}

impl From<url::ParseError> for IdentityError {
    fn from(e: url::ParseError) -> Self {
        IdentityError::InvalidConfig(format!("Invalid URL: {}", e))
    }
}

//! Cryptographic primitives for DeSo Identity
//!
//! This module provides the low-level operations the identity flows are
//! built on:
//! - secp256k1 key derivation, ECDH (X coordinate) and deterministic ECDSA
//! - Base58Check encoding of prefixed public keys
//! - Concatenation KDF, AES-128-CTR and HMAC-SHA256
//! - ECIES authenticated encryption for direct messages

pub mod base58;
pub mod ecies;
pub mod secp256k1;
pub mod symmetric;

pub use ecies::{decrypt_with_shared_secret, MIN_PAYLOAD_LEN};
pub use symmetric::CipherMode;

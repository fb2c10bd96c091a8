//! DeSo Identity Core Library
//!
//! Rust SDK for DeSo derived-key identities.
//!
//! # Architecture
//!
//! This crate provides:
//! - **crypto**: secp256k1, Base58Check, KDF/AES-CTR/HMAC and ECIES
//! - **tx**: signing transactions with a derived key
//! - **auth**: the login-state decision and the facts it is evaluated on
//! - **store**: persistence of derived keys and shared secrets
//! - **node**: typed client for a DeSo node
//! - **handshake**: the browser-driven identity service flow
//! - **identity**: the [`Identity`] facade tying them together
//! - **ffi**: C-ABI exports of the offline operations
//!
//! # FFI Usage
//!
//! All public FFI functions are in the `ffi` module and follow this pattern:
//! - Input: JSON string (null-terminated C string)
//! - Output: JSON string (must be freed with `deso_identity_free_string`)
//!
//! # Security
//!
//! Derived seeds and ECDH secrets are held in `zeroize::Zeroizing` buffers
//! and wiped when dropped. Debug output of key records redacts the seed.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use deso_identity::{Identity, IdentityConfig, EphemeralKeyStore, HttpNodeClient};
//!
//! let config = IdentityConfig::testnet();
//! let node = Arc::new(HttpNodeClient::new(&config)?);
//! let identity = Identity::new(config, Arc::new(EphemeralKeyStore::new()), node, handshake)?;
//! let response = identity.login(&CancellationToken::new()).await?;
//! ```

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ffi;
pub mod handshake;
pub mod identity;
pub mod messages;
pub mod node;
pub mod store;
pub mod tx;
pub mod types;
pub mod utils;

// Re-export key types for convenience
pub use config::IdentityConfig;
pub use error::{ErrorCode, IdentityError, IdentityResult};
pub use handshake::{AuthHandshake, CallbackHandshake};
pub use identity::Identity;
pub use node::{HttpNodeClient, NodeApi};
pub use store::{EphemeralKeyStore, FileStorage, KeyStore, MemoryStorage, PersistentKeyStore, SecureStorage};
pub use types::*;

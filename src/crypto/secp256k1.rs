//! secp256k1 primitives for DeSo identity keys
//!
//! Features:
//! - Uncompressed and compressed public key derivation
//! - ECDH returning only the X coordinate of the shared point
//! - Deterministic (RFC 6979) ECDSA with DER-encoded, low-S signatures
//! - Verification that tolerates high-S signatures

use ::secp256k1::ecdsa::Signature;
use ::secp256k1::{ecdh, Message, PublicKey, Secp256k1, SecretKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{IdentityError, IdentityResult};

/// Length of an uncompressed SEC1 public key
pub const UNCOMPRESSED_PUBLIC_KEY_LEN: usize = 65;

/// Length of a compressed SEC1 public key
pub const COMPRESSED_PUBLIC_KEY_LEN: usize = 33;

fn secret_key(private_key: &[u8]) -> IdentityResult<SecretKey> {
    if private_key.len() != 32 {
        return Err(IdentityError::BadPrivateKey);
    }
    SecretKey::from_slice(private_key).map_err(|_| IdentityError::BadPrivateKey)
}

/// Left-pad a 1..=32 byte digest to the 32 bytes ECDSA operates on
fn digest_message(digest: &[u8]) -> IdentityResult<Message> {
    if digest.is_empty() {
        return Err(IdentityError::EmptyMessage);
    }
    if digest.len() > 32 {
        return Err(IdentityError::MessageTooLong);
    }

    let mut padded = [0u8; 32];
    padded[32 - digest.len()..].copy_from_slice(digest);
    Ok(Message::from_digest(padded))
}

/// Generate a fresh private key from the OS random source
pub fn generate_private_key() -> Zeroizing<[u8; 32]> {
    let sk = SecretKey::new(&mut OsRng);
    Zeroizing::new(sk.secret_bytes())
}

/// Uncompressed public key (`0x04 || X || Y`) for a 32-byte scalar
pub fn public_key_from_private(private_key: &[u8]) -> IdentityResult<[u8; 65]> {
    let secp = Secp256k1::signing_only();
    let sk = secret_key(private_key)?;
    Ok(PublicKey::from_secret_key(&secp, &sk).serialize_uncompressed())
}

/// Compressed public key, the form embedded in Base58Check DeSo keys
pub fn compressed_public_key_from_private(private_key: &[u8]) -> IdentityResult<[u8; 33]> {
    let secp = Secp256k1::signing_only();
    let sk = secret_key(private_key)?;
    Ok(PublicKey::from_secret_key(&secp, &sk).serialize())
}

/// Re-encode any SEC1 public key in uncompressed form
pub fn decompress_public_key(public_key: &[u8]) -> IdentityResult<[u8; 65]> {
    let pk = PublicKey::from_slice(public_key).map_err(|_| IdentityError::BadPublicKey)?;
    Ok(pk.serialize_uncompressed())
}

/// X coordinate of `private_key · public_key`, big-endian with leading
/// zero bytes stripped.
pub fn derive_shared_x(private_key: &[u8], public_key: &[u8]) -> IdentityResult<Vec<u8>> {
    let sk = secret_key(private_key)?;
    let pk = PublicKey::from_slice(public_key).map_err(|_| IdentityError::BadPublicKey)?;

    let point = Zeroizing::new(ecdh::shared_secret_point(&pk, &sk));
    let x = &point[..32];
    let first_nonzero = x.iter().position(|b| *b != 0).unwrap_or(x.len());
    Ok(x[first_nonzero..].to_vec())
}

/// Deterministic ECDSA signature over `digest`, DER-encoded
pub fn sign(private_key: &[u8], digest: &[u8]) -> IdentityResult<Vec<u8>> {
    let secp = Secp256k1::signing_only();
    let sk = secret_key(private_key)?;
    let msg = digest_message(digest)?;

    let sig = secp.sign_ecdsa(&msg, &sk);
    Ok(sig.serialize_der().to_vec())
}

/// Verify a DER signature against an uncompressed public key
pub fn verify(public_key: &[u8], digest: &[u8], der_signature: &[u8]) -> IdentityResult<bool> {
    if public_key.len() != UNCOMPRESSED_PUBLIC_KEY_LEN || public_key[0] != 0x04 {
        return Err(IdentityError::BadPublicKey);
    }
    let msg = digest_message(digest)?;

    let secp = Secp256k1::verification_only();
    let pk = PublicKey::from_slice(public_key).map_err(|_| IdentityError::BadPublicKey)?;
    let mut sig = Signature::from_der(der_signature).map_err(|_| IdentityError::BadSignature)?;
    sig.normalize_s();

    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}

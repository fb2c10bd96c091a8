//! Transaction Signer
//!
//! DeSo transactions arrive from the node fully built except for the
//! signature: the final byte is a zero-length placeholder. Signing replaces
//! that byte with `len(sig) || der_signature`.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::crypto::{base58, secp256k1};
use crate::error::{IdentityError, IdentityResult};
use crate::types::parse_seed_hex;

/// Extra-data key the node expects when a derived key signs
pub const DERIVED_PUBLIC_KEY_EXTRA_DATA: &str = "DerivedPublicKey";

// =============================================================================
// Signing
// =============================================================================

/// Sign `transaction_hex` with the derived key `seed_hex`.
/// Returns the signed transaction hex ready for submission.
pub fn sign_transaction(seed_hex: &str, transaction_hex: &str) -> IdentityResult<String> {
    let seed = parse_seed_hex(seed_hex)?;

    let tx_bytes = hex::decode(transaction_hex.trim())
        .map_err(|e| IdentityError::InvalidHex(format!("Transaction hex: {}", e)))?;
    if tx_bytes.is_empty() {
        return Err(IdentityError::InvalidTransaction(
            "Transaction must contain at least the signature placeholder".to_string(),
        ));
    }

    let digest = Sha256::digest(&tx_bytes);
    let signature = secp256k1::sign(seed.as_slice(), &digest)?;
    let prefix = signature_length_prefix(signature.len());

    let mut signed = Vec::with_capacity(tx_bytes.len() - 1 + prefix.len() + signature.len());
    signed.extend_from_slice(&tx_bytes[..tx_bytes.len() - 1]);
    signed.extend_from_slice(&prefix);
    signed.extend_from_slice(&signature);

    Ok(hex::encode(signed))
}

/// Big-endian bytes of `len` with leading zero bytes stripped
pub fn signature_length_prefix(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first_nonzero..].to_vec()
}

// =============================================================================
// Extra Data
// =============================================================================

/// Extra data tagging a transaction as signed by `derived_public_key`.
///
/// The value is the hex of the raw key bytes behind the Base58Check string.
pub fn derived_key_extra_data(derived_public_key: &str, prefix_len: usize) -> IdentityResult<HashMap<String, String>> {
    let (_, payload) = base58::decode_with_prefix(derived_public_key, prefix_len)?;

    let mut extra = HashMap::new();
    extra.insert(DERIVED_PUBLIC_KEY_EXTRA_DATA.to_string(), hex::encode(payload));
    Ok(extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Network;

    const SEED: &str = "a3c5e6f1b2d4c6e8f0a1b3c5d7e9f1a3b5c7d9e1f3a5b7c9d1e3f5a7b9c1d3e5";
    const UNSIGNED: &str = "0101020304050600";

    #[test]
    fn test_signature_length_prefix() {
        assert_eq!(signature_length_prefix(71), vec![71]);
        assert_eq!(signature_length_prefix(256), vec![1, 0]);
        assert!(signature_length_prefix(0).is_empty());
    }

    #[test]
    fn test_sign_transaction_layout() {
        let signed = hex::decode(sign_transaction(SEED, UNSIGNED).unwrap()).unwrap();
        let unsigned = hex::decode(UNSIGNED).unwrap();

        let body = &signed[..unsigned.len() - 1];
        assert_eq!(body, &unsigned[..unsigned.len() - 1]);

        let sig_len = signed[unsigned.len() - 1] as usize;
        let der = &signed[unsigned.len()..];
        assert_eq!(der.len(), sig_len);
        assert_eq!(signed.len(), unsigned.len() - 1 + 1 + sig_len);

        let seed = parse_seed_hex(SEED).unwrap();
        let public = secp256k1::public_key_from_private(seed.as_slice()).unwrap();
        let digest = Sha256::digest(&unsigned);
        assert!(secp256k1::verify(&public, &digest, der).unwrap());
    }

    #[test]
    fn test_sign_transaction_is_deterministic() {
        assert_eq!(
            sign_transaction(SEED, UNSIGNED).unwrap(),
            sign_transaction(SEED, UNSIGNED).unwrap()
        );
    }

    #[test]
    fn test_odd_length_seed_is_accepted() {
        assert_eq!(
            sign_transaction("1", UNSIGNED).unwrap(),
            sign_transaction(&format!("{:0>64}", "1"), UNSIGNED).unwrap()
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(sign_transaction("not hex", UNSIGNED), Err(IdentityError::BadPrivateKey));
        assert_eq!(sign_transaction(&"00".repeat(32), UNSIGNED), Err(IdentityError::BadPrivateKey));
        assert!(matches!(sign_transaction(SEED, "0g"), Err(IdentityError::InvalidHex(_))));
        assert!(matches!(sign_transaction(SEED, ""), Err(IdentityError::InvalidTransaction(_))));
    }

    #[test]
    fn test_derived_key_extra_data() {
        let seed = parse_seed_hex(SEED).unwrap();
        let public = secp256k1::compressed_public_key_from_private(seed.as_slice()).unwrap();
        let encoded = base58::encode_public_key(Network::Mainnet, &public).unwrap();

        let extra = derived_key_extra_data(&encoded, 3).unwrap();
        assert_eq!(extra.get(DERIVED_PUBLIC_KEY_EXTRA_DATA), Some(&hex::encode(public)));
        assert_eq!(derived_key_extra_data("", 3), Err(IdentityError::InvalidFormat));
    }
}

//! Base58Check codec for DeSo public keys
//!
//! Layout: `prefix[n] || payload || checksum[4]`, where the checksum is the
//! first four bytes of `SHA256(SHA256(prefix || payload))`.

use sha2::{Digest, Sha256};

use crate::crypto::secp256k1::COMPRESSED_PUBLIC_KEY_LEN;
use crate::error::{IdentityError, IdentityResult};
use crate::types::Network;

const CHECKSUM_LEN: usize = 4;

fn checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(body);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

/// Encode `prefix || payload` with a trailing checksum
pub fn encode_with_prefix(prefix: &[u8], payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(prefix.len() + payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(prefix);
    data.extend_from_slice(payload);
    let sum = checksum(&data);
    data.extend_from_slice(&sum);
    bs58::encode(data).into_string()
}

/// Decode a Base58Check string into `(prefix, payload)`.
///
/// The checksum is verified before the body is split.
pub fn decode_with_prefix(input: &str, prefix_len: usize) -> IdentityResult<(Vec<u8>, Vec<u8>)> {
    if input.is_empty() {
        return Err(IdentityError::InvalidFormat);
    }

    let decoded = bs58::decode(input)
        .into_vec()
        .map_err(|_| IdentityError::InvalidFormat)?;
    if decoded.len() < CHECKSUM_LEN + 1 {
        return Err(IdentityError::InvalidFormat);
    }

    let (body, sum) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
    if checksum(body) != sum {
        return Err(IdentityError::ChecksumError);
    }
    if prefix_len > body.len() {
        return Err(IdentityError::InvalidFormat);
    }

    let (prefix, payload) = body.split_at(prefix_len);
    Ok((prefix.to_vec(), payload.to_vec()))
}

/// Base58Check public key for `network` from a SEC1 public key.
///
/// Uncompressed keys are compressed first; DeSo keys always carry the
/// 33-byte form.
pub fn encode_public_key(network: Network, public_key: &[u8]) -> IdentityResult<String> {
    let pk = ::secp256k1::PublicKey::from_slice(public_key).map_err(|_| IdentityError::BadPublicKey)?;
    Ok(encode_with_prefix(&network.public_key_prefix(), &pk.serialize()))
}

/// Decode a Base58Check public key to its compressed SEC1 bytes.
///
/// When `network` is given, the prefix must match it.
pub fn decode_public_key(network: Option<Network>, input: &str) -> IdentityResult<Vec<u8>> {
    let (prefix, payload) = decode_with_prefix(input, 3)?;

    if let Some(network) = network {
        if prefix[..] != network.public_key_prefix() {
            return Err(IdentityError::InvalidFormat);
        }
    }
    if payload.len() != COMPRESSED_PUBLIC_KEY_LEN {
        return Err(IdentityError::BadPublicKey);
    }

    ::secp256k1::PublicKey::from_slice(&payload).map_err(|_| IdentityError::BadPublicKey)?;
    Ok(payload)
}

/// Network whose prefix a Base58Check public key carries
pub fn network_of_public_key(input: &str) -> IdentityResult<Network> {
    let (prefix, _) = decode_with_prefix(input, 3)?;
    [Network::Mainnet, Network::Testnet]
        .into_iter()
        .find(|n| prefix[..] == n.public_key_prefix())
        .ok_or(IdentityError::InvalidFormat)
}

/// SEC1 bytes of a public key given either as Base58Check or as hex
pub fn parse_public_key(input: &str) -> IdentityResult<Vec<u8>> {
    let input = input.trim();
    if let Ok(bytes) = hex::decode(input) {
        if matches!(bytes.len(), 33 | 65) {
            ::secp256k1::PublicKey::from_slice(&bytes).map_err(|_| IdentityError::BadPublicKey)?;
            return Ok(bytes);
        }
    }
    decode_public_key(None, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::secp256k1::compressed_public_key_from_private;

    fn sample_public_key() -> [u8; 33] {
        let mut key = [0u8; 32];
        key[31] = 1;
        compressed_public_key_from_private(&key).unwrap()
    }

    #[test]
    fn test_round_trip_with_prefix() {
        let prefix = [0xcd, 0x14, 0x00];
        let payload = b"deso payload";
        let encoded = encode_with_prefix(&prefix, payload);

        let (p, data) = decode_with_prefix(&encoded, 3).unwrap();
        assert_eq!(p, prefix);
        assert_eq!(data, payload);
    }

    #[test]
    fn test_mainnet_keys_start_with_bc1yl() {
        let encoded = encode_public_key(Network::Mainnet, &sample_public_key()).unwrap();
        assert!(encoded.starts_with("BC1YL"));

        let testnet = encode_public_key(Network::Testnet, &sample_public_key()).unwrap();
        assert!(testnet.starts_with("tBC"));
    }

    #[test]
    fn test_decode_public_key() {
        let pk = sample_public_key();
        let encoded = encode_public_key(Network::Testnet, &pk).unwrap();

        assert_eq!(decode_public_key(None, &encoded).unwrap(), pk.to_vec());
        assert_eq!(decode_public_key(Some(Network::Testnet), &encoded).unwrap(), pk.to_vec());
        assert_eq!(
            decode_public_key(Some(Network::Mainnet), &encoded),
            Err(IdentityError::InvalidFormat)
        );
        assert_eq!(network_of_public_key(&encoded).unwrap(), Network::Testnet);
    }

    #[test]
    fn test_uncompressed_input_is_compressed() {
        let mut key = [0u8; 32];
        key[31] = 1;
        let uncompressed = crate::crypto::secp256k1::public_key_from_private(&key).unwrap();
        assert_eq!(
            encode_public_key(Network::Mainnet, &uncompressed).unwrap(),
            encode_public_key(Network::Mainnet, &sample_public_key()).unwrap()
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(decode_with_prefix("", 3), Err(IdentityError::InvalidFormat));
        // '0', 'O', 'I' and 'l' are outside the alphabet
        assert_eq!(decode_with_prefix("0OIl", 3), Err(IdentityError::InvalidFormat));
        // four bytes decode too short to hold a checksum and a body
        let short = bs58::encode([1u8, 2, 3, 4]).into_string();
        assert_eq!(decode_with_prefix(&short, 0), Err(IdentityError::InvalidFormat));

        let encoded = encode_with_prefix(&[1], &[2, 3]);
        assert_eq!(decode_with_prefix(&encoded, 4), Err(IdentityError::InvalidFormat));
    }

    #[test]
    fn test_checksum_mismatch() {
        let encoded = encode_with_prefix(&[0xcd, 0x14, 0x00], &sample_public_key());
        let mut raw = bs58::decode(&encoded).into_vec().unwrap();
        raw[5] ^= 0x01;
        let tampered = bs58::encode(raw).into_string();
        assert_eq!(decode_with_prefix(&tampered, 3), Err(IdentityError::ChecksumError));
    }

    #[test]
    fn test_parse_public_key_accepts_both_forms() {
        let key = sample_public_key();
        let encoded = encode_public_key(Network::Testnet, &key).unwrap();
        assert_eq!(parse_public_key(&encoded).unwrap(), key.to_vec());
        assert_eq!(parse_public_key(&hex::encode(key)).unwrap(), key.to_vec());
        assert!(parse_public_key("not a key").is_err());
    }
}

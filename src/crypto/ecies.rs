//! ECIES over secp256k1 with AES-128-CTR and HMAC-SHA256
//!
//! Wire format: `ephemeral_public_key[65] || iv[16] || ciphertext || hmac[32]`.
//! The HMAC covers `iv || ciphertext` and is checked before any byte is
//! decrypted.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::secp256k1::{self, UNCOMPRESSED_PUBLIC_KEY_LEN};
use super::symmetric::{self, CipherMode, AES_BLOCK_LEN};
use crate::error::{IdentityError, IdentityResult};
use crate::types::parse_seed_hex;

const IV_LEN: usize = AES_BLOCK_LEN;
const MAC_LEN: usize = 32;
const HEADER_LEN: usize = UNCOMPRESSED_PUBLIC_KEY_LEN + IV_LEN;

/// Smallest payload length that is still rejected
pub const MIN_PAYLOAD_LEN: usize = HEADER_LEN + MAC_LEN;

struct DerivedKeys {
    enc_key: Zeroizing<Vec<u8>>,
    mac_key: Zeroizing<[u8; 32]>,
}

fn derive_keys(shared_x: &[u8]) -> DerivedKeys {
    let material = symmetric::kdf(shared_x, 32);
    let enc_key = Zeroizing::new(material[..16].to_vec());
    let mac_key = Zeroizing::new(Sha256::digest(&material[16..32]).into());
    DerivedKeys { enc_key, mac_key }
}

/// Encrypt `msg` to `recipient_public_key`.
///
/// `ephemeral_private_key` and `iv` are drawn from the OS random source when
/// not supplied.
pub fn encrypt(
    recipient_public_key: &[u8],
    msg: &[u8],
    ephemeral_private_key: Option<&[u8]>,
    iv: Option<&[u8]>,
    mode: CipherMode,
) -> IdentityResult<Vec<u8>> {
    if msg.is_empty() {
        return Err(IdentityError::EmptyMessage);
    }

    let ephemeral = match ephemeral_private_key {
        Some(key) => {
            let mut owned = Zeroizing::new([0u8; 32]);
            if key.len() != 32 {
                return Err(IdentityError::BadPrivateKey);
            }
            owned.copy_from_slice(key);
            owned
        }
        None => secp256k1::generate_private_key(),
    };
    let ephemeral_public = secp256k1::public_key_from_private(ephemeral.as_slice())?;

    let iv: [u8; IV_LEN] = match iv {
        Some(iv) => iv
            .try_into()
            .map_err(|_| IdentityError::InvalidCipherText("IV must be 16 bytes".to_string()))?,
        None => {
            let mut fresh = [0u8; IV_LEN];
            rand::rngs::OsRng.fill_bytes(&mut fresh);
            fresh
        }
    };

    let shared_x = Zeroizing::new(secp256k1::derive_shared_x(ephemeral.as_slice(), recipient_public_key)?);
    let keys = derive_keys(&shared_x);

    let ciphertext = symmetric::encrypt_with_mode(mode, &iv, &keys.enc_key, msg)?;

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len() + MAC_LEN);
    out.extend_from_slice(&ephemeral_public);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    let tag = symmetric::hmac_sha256(keys.mac_key.as_slice(), &out[UNCOMPRESSED_PUBLIC_KEY_LEN..])?;
    out.extend_from_slice(&tag);

    Ok(out)
}

/// Authenticate and decrypt an ECIES payload with the recipient's key
pub fn decrypt(recipient_private_key: &[u8], encrypted: &[u8], mode: CipherMode) -> IdentityResult<Vec<u8>> {
    if encrypted.len() <= MIN_PAYLOAD_LEN {
        return Err(IdentityError::InvalidCipherText(format!(
            "Payload must be longer than {} bytes, got {}",
            MIN_PAYLOAD_LEN,
            encrypted.len()
        )));
    }
    if !matches!(encrypted[0], 0x02..=0x04) {
        return Err(IdentityError::InvalidCipherText(format!(
            "Invalid ephemeral key marker 0x{:02x}",
            encrypted[0]
        )));
    }

    let ephemeral_public = &encrypted[..UNCOMPRESSED_PUBLIC_KEY_LEN];
    let iv = &encrypted[UNCOMPRESSED_PUBLIC_KEY_LEN..HEADER_LEN];
    let mac_offset = encrypted.len() - MAC_LEN;
    let ciphertext = &encrypted[HEADER_LEN..mac_offset];
    let tag = &encrypted[mac_offset..];

    let shared_x = Zeroizing::new(secp256k1::derive_shared_x(recipient_private_key, ephemeral_public)?);
    let keys = derive_keys(&shared_x);

    let expected = symmetric::hmac_sha256(keys.mac_key.as_slice(), &encrypted[UNCOMPRESSED_PUBLIC_KEY_LEN..mac_offset])?;
    if !bool::from(expected.ct_eq(tag)) {
        return Err(IdentityError::IncorrectMAC);
    }

    symmetric::decrypt_with_mode(mode, iv, &keys.enc_key, ciphertext)
}

fn shared_private_key(shared_px: &[u8]) -> Zeroizing<Vec<u8>> {
    symmetric::kdf(shared_px, 32)
}

/// Encrypt to the one-time key pair derived from an agreed X coordinate
pub fn encrypt_shared(
    shared_px: &[u8],
    msg: &[u8],
    ephemeral_private_key: Option<&[u8]>,
    iv: Option<&[u8]>,
    mode: CipherMode,
) -> IdentityResult<Vec<u8>> {
    let private_key = shared_private_key(shared_px);
    let public_key = secp256k1::public_key_from_private(&private_key)?;
    encrypt(&public_key, msg, ephemeral_private_key, iv, mode)
}

/// Decrypt with the one-time key derived from an agreed X coordinate
pub fn decrypt_shared(shared_px: &[u8], encrypted: &[u8], mode: CipherMode) -> IdentityResult<Vec<u8>> {
    let private_key = shared_private_key(shared_px);
    decrypt(&private_key, encrypted, mode)
}

/// Encrypt from `sender_private_key` to `recipient_public_key` over their
/// ECDH secret
pub fn encrypt_shared_with_keys(
    sender_private_key: &[u8],
    recipient_public_key: &[u8],
    msg: &[u8],
    ephemeral_private_key: Option<&[u8]>,
    iv: Option<&[u8]>,
    mode: CipherMode,
) -> IdentityResult<Vec<u8>> {
    let shared_px = Zeroizing::new(secp256k1::derive_shared_x(sender_private_key, recipient_public_key)?);
    encrypt_shared(&shared_px, msg, ephemeral_private_key, iv, mode)
}

/// Counterpart of [`encrypt_shared_with_keys`]
pub fn decrypt_shared_with_keys(
    recipient_private_key: &[u8],
    sender_public_key: &[u8],
    encrypted: &[u8],
    mode: CipherMode,
) -> IdentityResult<Vec<u8>> {
    let shared_px = Zeroizing::new(secp256k1::derive_shared_x(recipient_private_key, sender_public_key)?);
    decrypt_shared(&shared_px, encrypted, mode)
}

/// Decrypt a hex message with a conversation secret from the identity
/// service. The secret is used directly as the recipient private key.
pub fn decrypt_with_shared_secret(secret_hex: &str, ciphertext_hex: &str, v2: bool) -> IdentityResult<Vec<u8>> {
    let private_key = parse_seed_hex(secret_hex)?;
    let encrypted = hex::decode(ciphertext_hex.trim())
        .map_err(|_| IdentityError::InvalidCipherText("Ciphertext is not valid hex".to_string()))?;
    decrypt(private_key.as_slice(), &encrypted, CipherMode::from_v2(v2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> [u8; 32] {
        let mut k = [0u8; 32];
        k[31] = n;
        k
    }

    #[test]
    fn test_round_trip_both_modes() {
        let recipient = key(21);
        let recipient_pub = secp256k1::public_key_from_private(&recipient).unwrap();

        for mode in [CipherMode::Standard, CipherMode::Legacy] {
            let encrypted = encrypt(&recipient_pub, b"gm deso", None, None, mode).unwrap();
            assert_eq!(encrypted[0], 0x04);
            assert_eq!(decrypt(&recipient, &encrypted, mode).unwrap(), b"gm deso");
        }
    }

    #[test]
    fn test_layout_with_injected_randomness() {
        let recipient_pub = secp256k1::public_key_from_private(&key(2)).unwrap();
        let ephemeral = key(3);
        let iv = [0x11u8; 16];

        let first = encrypt(&recipient_pub, b"hello", Some(&ephemeral), Some(&iv), CipherMode::Standard).unwrap();
        let second = encrypt(&recipient_pub, b"hello", Some(&ephemeral), Some(&iv), CipherMode::Standard).unwrap();
        assert_eq!(first, second);

        assert_eq!(first.len(), 65 + 16 + 5 + 32);
        assert_eq!(&first[..65], &secp256k1::public_key_from_private(&ephemeral).unwrap()[..]);
        assert_eq!(&first[65..81], &iv);

        let shared_x = secp256k1::derive_shared_x(&ephemeral, &recipient_pub).unwrap();
        let material = symmetric::kdf(&shared_x, 32);
        let mac_key: [u8; 32] = Sha256::digest(&material[16..32]).into();
        let tag = symmetric::hmac_sha256(&mac_key, &first[65..first.len() - 32]).unwrap();
        assert_eq!(&first[first.len() - 32..], &tag);
    }

    #[test]
    fn test_tampering_is_detected() {
        let recipient = key(8);
        let recipient_pub = secp256k1::public_key_from_private(&recipient).unwrap();
        let encrypted = encrypt(&recipient_pub, b"attack at dawn", None, None, CipherMode::Standard).unwrap();

        for index in 65..encrypted.len() {
            let mut tampered = encrypted.clone();
            tampered[index] ^= 0x80;
            assert_eq!(
                decrypt(&recipient, &tampered, CipherMode::Standard),
                Err(IdentityError::IncorrectMAC),
                "byte {} flipped",
                index
            );
        }
    }

    #[test]
    fn test_wrong_recipient_fails_mac() {
        let recipient_pub = secp256k1::public_key_from_private(&key(4)).unwrap();
        let encrypted = encrypt(&recipient_pub, b"secret", None, None, CipherMode::Standard).unwrap();
        assert_eq!(
            decrypt(&key(5), &encrypted, CipherMode::Standard),
            Err(IdentityError::IncorrectMAC)
        );
    }

    #[test]
    fn test_malformed_payloads() {
        let short = vec![0x04u8; MIN_PAYLOAD_LEN];
        assert!(matches!(
            decrypt(&key(1), &short, CipherMode::Standard),
            Err(IdentityError::InvalidCipherText(_))
        ));

        let mut bad_marker = vec![0u8; MIN_PAYLOAD_LEN + 1];
        bad_marker[0] = 0x05;
        assert!(matches!(
            decrypt(&key(1), &bad_marker, CipherMode::Standard),
            Err(IdentityError::InvalidCipherText(_))
        ));
    }

    #[test]
    fn test_empty_message_is_rejected() {
        let recipient_pub = secp256k1::public_key_from_private(&key(4)).unwrap();
        assert_eq!(
            encrypt(&recipient_pub, b"", None, None, CipherMode::Standard),
            Err(IdentityError::EmptyMessage)
        );
    }

    #[test]
    fn test_shared_variants_round_trip() {
        let alice = key(30);
        let bob = key(31);
        let alice_pub = secp256k1::public_key_from_private(&alice).unwrap();
        let bob_pub = secp256k1::public_key_from_private(&bob).unwrap();

        let encrypted =
            encrypt_shared_with_keys(&alice, &bob_pub, b"thread message", None, None, CipherMode::Standard).unwrap();
        let plain = decrypt_shared_with_keys(&bob, &alice_pub, &encrypted, CipherMode::Standard).unwrap();
        assert_eq!(plain, b"thread message");

        let shared_px = secp256k1::derive_shared_x(&alice, &bob_pub).unwrap();
        assert_eq!(decrypt_shared(&shared_px, &encrypted, CipherMode::Standard).unwrap(), b"thread message");
    }

    #[test]
    fn test_decrypt_with_shared_secret_hex() {
        let secret = key(77);
        let public = secp256k1::public_key_from_private(&secret).unwrap();

        let v2 = encrypt(&public, b"v2 text", None, None, CipherMode::Standard).unwrap();
        let v1 = encrypt(&public, b"v1 text", None, None, CipherMode::Legacy).unwrap();

        assert_eq!(decrypt_with_shared_secret("4d", &hex::encode(&v2), true).unwrap(), b"v2 text");
        assert_eq!(decrypt_with_shared_secret("4d", &hex::encode(&v1), false).unwrap(), b"v1 text");
        assert!(matches!(
            decrypt_with_shared_secret("4d", "zz", true),
            Err(IdentityError::InvalidCipherText(_))
        ));
    }
}

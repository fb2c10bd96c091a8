//! KDF and symmetric layer used by the ECIES engine
//!
//! - Concatenation KDF over SHA-256 (`SHA256(be32(counter) || secret)`)
//! - AES-128-CTR with a 128-bit big-endian counter block
//! - HMAC-SHA256 tagging

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{IdentityError, IdentityResult};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type HmacSha256 = Hmac<Sha256>;

pub const AES_BLOCK_LEN: usize = 16;

/// Cipher mode of an ECIES payload.
///
/// `Legacy` payloads carry PKCS7 padding inside the CTR keystream; `Standard`
/// payloads are unpadded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherMode {
    #[default]
    Standard,
    Legacy,
}

impl CipherMode {
    /// Mode for a message's `v2` flag
    pub fn from_v2(v2: bool) -> Self {
        if v2 {
            CipherMode::Standard
        } else {
            CipherMode::Legacy
        }
    }
}

/// Derive `len` bytes from `secret`
pub fn kdf(secret: &[u8], len: usize) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(len + 32));
    let mut counter: u32 = 1;

    while out.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(secret);
        out.extend_from_slice(&hasher.finalize());
        counter = counter.wrapping_add(1);
    }

    out.truncate(len);
    out
}

fn apply_keystream(iv: &[u8], key: &[u8], data: &[u8]) -> IdentityResult<Vec<u8>> {
    let mut cipher = Aes128Ctr::new_from_slices(key, iv)
        .map_err(|_| IdentityError::InvalidCipherText("AES key must be 16 bytes and IV 16 bytes".to_string()))?;
    let mut buf = data.to_vec();
    cipher.apply_keystream(&mut buf);
    Ok(buf)
}

/// AES-128-CTR encryption
pub fn aes_ctr_encrypt(iv: &[u8], key: &[u8], data: &[u8]) -> IdentityResult<Vec<u8>> {
    apply_keystream(iv, key, data)
}

/// AES-128-CTR decryption (same keystream XOR as encryption)
pub fn aes_ctr_decrypt(iv: &[u8], key: &[u8], data: &[u8]) -> IdentityResult<Vec<u8>> {
    apply_keystream(iv, key, data)
}

/// Encrypt in the given mode
pub fn encrypt_with_mode(mode: CipherMode, iv: &[u8], key: &[u8], data: &[u8]) -> IdentityResult<Vec<u8>> {
    match mode {
        CipherMode::Standard => aes_ctr_encrypt(iv, key, data),
        CipherMode::Legacy => {
            let padded = Zeroizing::new(pkcs7_pad(data));
            aes_ctr_encrypt(iv, key, &padded)
        }
    }
}

/// Decrypt in the given mode
pub fn decrypt_with_mode(mode: CipherMode, iv: &[u8], key: &[u8], data: &[u8]) -> IdentityResult<Vec<u8>> {
    match mode {
        CipherMode::Standard => aes_ctr_decrypt(iv, key, data),
        CipherMode::Legacy => {
            let mut plain = aes_ctr_decrypt(iv, key, data)?;
            let len = pkcs7_unpadded_len(&plain)?;
            plain.truncate(len);
            Ok(plain)
        }
    }
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad = AES_BLOCK_LEN - data.len() % AES_BLOCK_LEN;
    let mut out = Vec::with_capacity(data.len() + pad);
    out.extend_from_slice(data);
    out.resize(data.len() + pad, pad as u8);
    out
}

fn pkcs7_unpadded_len(data: &[u8]) -> IdentityResult<usize> {
    let bad_padding = || IdentityError::InvalidCipherText("Invalid PKCS7 padding".to_string());

    if data.is_empty() || data.len() % AES_BLOCK_LEN != 0 {
        return Err(bad_padding());
    }
    let pad = *data.last().ok_or_else(bad_padding)? as usize;
    if pad == 0 || pad > AES_BLOCK_LEN {
        return Err(bad_padding());
    }
    if !data[data.len() - pad..].iter().all(|b| *b as usize == pad) {
        return Err(bad_padding());
    }
    Ok(data.len() - pad)
}

/// HMAC-SHA256 of `msg` under `key`
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> IdentityResult<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| IdentityError::InvalidCipherText("Invalid HMAC key".to_string()))?;
    mac.update(msg);
    Ok(mac.finalize().into_bytes().into())
}

//! Message Thread Decryption
//!
//! A thread is decrypted with the shared secret of its conversation. Secrets
//! come from the key store; missing ones are requested through the handshake
//! once per call and cached.

use std::collections::HashMap;

use crate::crypto::decrypt_with_shared_secret;
use crate::error::{IdentityError, IdentityResult};
use crate::handshake::AuthHandshake;
use crate::store::KeyStore;
use crate::types::{EncryptedMessagesThread, SharedSecret};
use crate::{log_debug, log_warn};

/// Counterparty of `owner_public_key` in `thread`
pub fn counterparty<'a>(thread: &'a EncryptedMessagesThread, owner_public_key: &str) -> &'a str {
    if thread.public_key == owner_public_key {
        &thread.other_public_key
    } else {
        &thread.public_key
    }
}

/// Decrypt every message of `thread` in order.
///
/// With `error_on_failure` the first undecryptable message fails the call;
/// otherwise such messages are left out and the rest keep their order.
pub fn decrypt_thread_with_secret(
    secret_hex: &str,
    thread: &EncryptedMessagesThread,
    error_on_failure: bool,
) -> IdentityResult<Vec<String>> {
    let mut plaintexts = Vec::with_capacity(thread.encrypted_messages.len());

    for (index, message) in thread.encrypted_messages.iter().enumerate() {
        let decrypted = decrypt_with_shared_secret(secret_hex, &message.message, message.v2).and_then(|bytes| {
            String::from_utf8(bytes)
                .map_err(|_| IdentityError::InvalidCipherText("Message is not valid UTF-8".to_string()))
        });

        match decrypted {
            Ok(text) => plaintexts.push(text),
            Err(e) if error_on_failure => return Err(e),
            Err(e) => {
                log_warn!("messages", "Skipping undecryptable message", index = index, error = e);
            }
        }
    }

    Ok(plaintexts)
}

/// Shared secrets for each counterparty, fetching missing ones.
pub async fn resolve_shared_secrets(
    store: &dyn KeyStore,
    handshake: &dyn AuthHandshake,
    owner_public_key: &str,
    counterparty_public_keys: &[String],
    callback_token: &str,
) -> IdentityResult<HashMap<String, SharedSecret>> {
    let mut resolved = HashMap::new();
    let mut missing = Vec::new();

    for other in counterparty_public_keys {
        if resolved.contains_key(other) || missing.contains(other) {
            continue;
        }
        match store.shared_secret(owner_public_key, other)? {
            Some(secret) => {
                resolved.insert(other.clone(), secret);
            }
            None => missing.push(other.clone()),
        }
    }

    if !missing.is_empty() {
        log_debug!("messages", "Requesting shared secrets", owner = owner_public_key, count = missing.len());
        let fetched = handshake
            .request_shared_secrets(owner_public_key, &missing, callback_token)
            .await?;

        for secret in fetched {
            if secret.public_key != owner_public_key || !missing.contains(&secret.other_public_key) {
                continue;
            }
            store.store_shared_secret(&secret)?;
            resolved.insert(secret.other_public_key.clone(), secret);
        }

        if let Some(other) = missing.iter().find(|other| !resolved.contains_key(*other)) {
            return Err(IdentityError::MissingSharedSecret {
                owner: owner_public_key.to_string(),
                other: other.clone(),
            });
        }
    }

    Ok(resolved)
}

/// Decrypt several threads, keyed by counterparty public key.
pub async fn decrypt_threads(
    store: &dyn KeyStore,
    handshake: &dyn AuthHandshake,
    owner_public_key: &str,
    threads: &[EncryptedMessagesThread],
    error_on_failure: bool,
    callback_token: &str,
) -> IdentityResult<HashMap<String, Vec<String>>> {
    let counterparties: Vec<String> = threads
        .iter()
        .map(|thread| counterparty(thread, owner_public_key).to_string())
        .collect();
    let secrets = resolve_shared_secrets(store, handshake, owner_public_key, &counterparties, callback_token).await?;

    let mut decrypted: HashMap<String, Vec<String>> = HashMap::with_capacity(threads.len());
    for (thread, other) in threads.iter().zip(counterparties) {
        let secret = secrets.get(&other).ok_or_else(|| IdentityError::MissingSharedSecret {
            owner: owner_public_key.to_string(),
            other: other.clone(),
        })?;
        let messages = decrypt_thread_with_secret(&secret.secret, thread, error_on_failure)?;
        decrypted.entry(other).or_default().extend(messages);
    }

    Ok(decrypted)
}

//! Authorization Handshake
//!
//! The identity service runs in a browser. A request opens
//! `{identity}/derive` (or `/get-shared-secrets`) with a callback URL; the
//! service redirects back to that callback with the result in the query
//! string. Requests are correlated by a caller-chosen token carried as the
//! `state` parameter.
//!
//! [`CallbackHandshake`] implements the flow for apps that receive the
//! redirect themselves: it hands the URL to a launcher, then waits until
//! [`CallbackHandshake::complete`] is called with the redirect.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::oneshot;
use url::Url;

use crate::config::IdentityConfig;
use crate::error::{IdentityError, IdentityResult};
use crate::types::{DerivedKeyInfo, Network, SharedSecret};
use crate::{log_debug, log_warn};

const STATE_PARAM: &str = "state";
const SHARED_SECRETS_PARAM: &str = "sharedSecrets";

#[async_trait]
pub trait AuthHandshake: Send + Sync {
    /// Run the derive flow and return the issued derived key
    async fn request_derived_key(&self, network: Network, callback_token: &str) -> IdentityResult<DerivedKeyInfo>;

    /// Fetch one shared secret per counterparty of `owner_public_key`
    async fn request_shared_secrets(
        &self,
        owner_public_key: &str,
        counterparty_public_keys: &[String],
        callback_token: &str,
    ) -> IdentityResult<Vec<SharedSecret>>;
}

/// Random token correlating a request with its callback
pub fn generate_callback_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// =============================================================================
// URL Codec
// =============================================================================

fn identity_endpoint(config: &IdentityConfig, path: &str) -> IdentityResult<Url> {
    let base = Url::parse(&config.identity_url)?;
    Ok(base.join(path)?)
}

fn callback_url(callback_scheme: &str) -> IdentityResult<String> {
    let valid = !callback_scheme.is_empty()
        && callback_scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && callback_scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return Err(IdentityError::InvalidConfig(format!(
            "Invalid callback scheme '{}'",
            callback_scheme
        )));
    }
    Ok(format!("{}://", callback_scheme))
}

/// URL of the identity service's derive page
pub fn derive_url(config: &IdentityConfig, callback_scheme: &str, callback_token: &str) -> IdentityResult<Url> {
    let mut url = identity_endpoint(config, "derive")?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("callback", &callback_url(callback_scheme)?);
        query.append_pair("webview", "true");
        query.append_pair(STATE_PARAM, callback_token);
        if config.network.is_testnet() {
            query.append_pair("testnet", "true");
        }
    }
    Ok(url)
}

/// URL of the identity service's shared-secret page
pub fn shared_secrets_url(
    config: &IdentityConfig,
    callback_scheme: &str,
    owner_public_key: &str,
    counterparty_public_keys: &[String],
    callback_token: &str,
) -> IdentityResult<Url> {
    let mut url = identity_endpoint(config, "get-shared-secrets")?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("callback", &callback_url(callback_scheme)?);
        query.append_pair("webview", "true");
        query.append_pair(STATE_PARAM, callback_token);
        query.append_pair("ownerPublicKey", owner_public_key);
        query.append_pair("publicKeys", &counterparty_public_keys.join(","));
        if config.network.is_testnet() {
            query.append_pair("testnet", "true");
        }
    }
    Ok(url)
}

fn query_map(url: &Url) -> HashMap<String, String> {
    url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
}

/// Token carried by a callback URL, if any
pub fn callback_token(url: &Url) -> Option<String> {
    callback_param(url, STATE_PARAM)
}

/// Parse the derive callback into a [`DerivedKeyInfo`].
///
/// `network` is used when the callback does not name one.
pub fn derived_key_from_callback(url: &Url, network: Network) -> IdentityResult<DerivedKeyInfo> {
    let query = query_map(url);
    let required = |name: &str| -> IdentityResult<String> {
        query
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| IdentityError::HandshakeFailed(format!("Callback is missing '{}'", name)))
    };

    let expiration_block = required("expirationBlock")?
        .parse::<u64>()
        .map_err(|_| IdentityError::HandshakeFailed("Callback has a non-numeric 'expirationBlock'".to_string()))?;

    let network = match query.get("network").map(String::as_str) {
        None | Some("") => network,
        Some("mainnet") => Network::Mainnet,
        Some("testnet") => Network::Testnet,
        Some(other) => {
            return Err(IdentityError::HandshakeFailed(format!("Unknown network '{}'", other)));
        }
    };

    Ok(DerivedKeyInfo {
        owner_public_key: required("publicKey")?,
        derived_public_key: required("derivedPublicKey")?,
        derived_seed_hex: required("derivedSeedHex")?,
        btc_deposit_address: query.get("btcDepositAddress").cloned().unwrap_or_default(),
        expiration_block,
        access_signature: required("accessSignature")?,
        network,
        jwt: query.get("jwt").cloned().unwrap_or_default(),
        derived_jwt: query.get("derivedJwt").cloned().unwrap_or_default(),
    })
}

/// Parse the shared-secret callback. Secrets arrive comma separated, in the
/// order the counterparties were requested.
pub fn shared_secrets_from_callback(
    url: &Url,
    owner_public_key: &str,
    counterparty_public_keys: &[String],
) -> IdentityResult<Vec<SharedSecret>> {
    let raw = callback_param(url, SHARED_SECRETS_PARAM)
        .ok_or_else(|| IdentityError::HandshakeFailed("No shared secrets returned".to_string()))?;
    let secrets: Vec<&str> = raw.split(',').filter(|s| !s.is_empty()).collect();

    if secrets.len() != counterparty_public_keys.len() {
        return Err(IdentityError::HandshakeFailed(format!(
            "Expected {} shared secrets, got {}",
            counterparty_public_keys.len(),
            secrets.len()
        )));
    }

    Ok(secrets
        .into_iter()
        .zip(counterparty_public_keys)
        .map(|(secret, other)| SharedSecret {
            secret: secret.to_string(),
            public_key: owner_public_key.to_string(),
            other_public_key: other.clone(),
        })
        .collect())
}

fn callback_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned())
}

// =============================================================================
// Callback-driven Handshake
// =============================================================================

type Launcher = Box<dyn Fn(&Url) -> IdentityResult<()> + Send + Sync>;

/// [`AuthHandshake`] completed by redirect URLs the host app receives
pub struct CallbackHandshake {
    config: IdentityConfig,
    callback_scheme: String,
    launcher: Launcher,
    pending: Mutex<HashMap<String, oneshot::Sender<Url>>>,
}

impl CallbackHandshake {
    /// `launcher` opens the identity URL, typically in a browser
    pub fn new<F>(config: IdentityConfig, callback_scheme: impl Into<String>, launcher: F) -> Self
    where
        F: Fn(&Url) -> IdentityResult<()> + Send + Sync + 'static,
    {
        Self {
            config,
            callback_scheme: callback_scheme.into(),
            launcher: Box::new(launcher),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Deliver a redirect. Returns `true` when it matched a waiting request.
    pub fn complete(&self, callback: Url) -> bool {
        let Some(token) = callback_token(&callback) else {
            log_warn!("handshake", "Callback without a token ignored");
            return false;
        };
        let sender = match self.pending.lock() {
            Ok(mut pending) => pending.remove(&token),
            Err(_) => None,
        };
        match sender {
            Some(sender) => sender.send(callback).is_ok(),
            None => {
                log_warn!("handshake", "Callback for unknown request", token = token);
                false
            }
        }
    }

    /// Number of requests still waiting for a callback
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    async fn round_trip(&self, url: Url, callback_token: &str) -> IdentityResult<Url> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| IdentityError::HandshakeFailed("Handshake state poisoned".to_string()))?;
            match pending.entry(callback_token.to_string()) {
                Entry::Occupied(_) => {
                    return Err(IdentityError::HandshakeFailed(format!(
                        "Callback token '{}' is already pending",
                        callback_token
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(tx);
                }
            }
        }
        let _cleanup = PendingGuard {
            handshake: self,
            token: callback_token,
        };

        log_debug!("handshake", "Opening identity service", path = url.path());
        (self.launcher)(&url)?;

        rx.await
            .map_err(|_| IdentityError::HandshakeFailed("Handshake abandoned".to_string()))
    }
}

/// Drops the pending entry when a request finishes or is cancelled
struct PendingGuard<'a> {
    handshake: &'a CallbackHandshake,
    token: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.handshake.pending.lock() {
            pending.remove(self.token);
        }
    }
}

#[async_trait]
impl AuthHandshake for CallbackHandshake {
    async fn request_derived_key(&self, network: Network, callback_token: &str) -> IdentityResult<DerivedKeyInfo> {
        let mut config = self.config.clone();
        config.network = network;
        let url = derive_url(&config, &self.callback_scheme, callback_token)?;

        let callback = self.round_trip(url, callback_token).await?;
        derived_key_from_callback(&callback, network)
    }

    async fn request_shared_secrets(
        &self,
        owner_public_key: &str,
        counterparty_public_keys: &[String],
        callback_token: &str,
    ) -> IdentityResult<Vec<SharedSecret>> {
        let url = shared_secrets_url(
            &self.config,
            &self.callback_scheme,
            owner_public_key,
            counterparty_public_keys,
            callback_token,
        )?;

        let callback = self.round_trip(url, callback_token).await?;
        shared_secrets_from_callback(&callback, owner_public_key, counterparty_public_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn derive_callback(token: &str) -> Url {
        let mut url = Url::parse("com.example.app://").unwrap();
        url.query_pairs_mut()
            .append_pair("state", token)
            .append_pair("publicKey", "BC1YLowner")
            .append_pair("derivedPublicKey", "BC1YLderived")
            .append_pair("derivedSeedHex", "0abc")
            .append_pair("btcDepositAddress", "1BTC")
            .append_pair("expirationBlock", "123456")
            .append_pair("accessSignature", "3044")
            .append_pair("jwt", "owner.jwt")
            .append_pair("derivedJwt", "derived.jwt");
        url
    }

    #[test]
    fn test_derive_url() {
        let url = derive_url(&IdentityConfig::testnet(), "com.example.app", "tok").unwrap();
        assert_eq!(url.path(), "/derive");
        let query = query_map(&url);
        assert_eq!(query["callback"], "com.example.app://");
        assert_eq!(query["webview"], "true");
        assert_eq!(query["state"], "tok");
        assert_eq!(query["testnet"], "true");

        let mainnet = derive_url(&IdentityConfig::mainnet(), "com.example.app", "tok").unwrap();
        assert!(!query_map(&mainnet).contains_key("testnet"));

        assert!(matches!(
            derive_url(&IdentityConfig::mainnet(), "bad scheme", "tok"),
            Err(IdentityError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_derived_key_from_callback() {
        let info = derived_key_from_callback(&derive_callback("tok"), Network::Mainnet).unwrap();
        assert_eq!(info.owner_public_key, "BC1YLowner");
        assert_eq!(info.derived_seed_hex, "0abc");
        assert_eq!(info.expiration_block, 123456);
        assert_eq!(info.network, Network::Mainnet);
        assert_eq!(info.derived_jwt, "derived.jwt");
        assert_eq!(callback_token(&derive_callback("tok")).as_deref(), Some("tok"));
    }

    #[test]
    fn test_incomplete_callback_is_rejected() {
        let url = Url::parse("com.example.app://?publicKey=BC1YLowner").unwrap();
        assert!(matches!(
            derived_key_from_callback(&url, Network::Mainnet),
            Err(IdentityError::HandshakeFailed(_))
        ));

        let mut bad_block = derive_callback("tok");
        bad_block.query_pairs_mut().clear().append_pair("expirationBlock", "soon");
        assert!(matches!(
            derived_key_from_callback(&bad_block, Network::Mainnet),
            Err(IdentityError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn test_shared_secrets_from_callback() {
        let others = vec!["BC1YLalice".to_string(), "BC1YLbob".to_string()];
        let url = Url::parse("com.example.app://?state=t&sharedSecrets=aa,bb").unwrap();
        let secrets = shared_secrets_from_callback(&url, "BC1YLowner", &others).unwrap();
        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets[1].secret, "bb");
        assert_eq!(secrets[1].other_public_key, "BC1YLbob");
        assert_eq!(secrets[0].public_key, "BC1YLowner");

        let short = Url::parse("com.example.app://?sharedSecrets=aa").unwrap();
        assert!(matches!(
            shared_secrets_from_callback(&short, "BC1YLowner", &others),
            Err(IdentityError::HandshakeFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_callback_handshake_round_trip() {
        let opened = Arc::new(Mutex::new(Vec::<Url>::new()));
        let opened_clone = Arc::clone(&opened);
        let handshake = Arc::new(CallbackHandshake::new(
            IdentityConfig::mainnet(),
            "com.example.app",
            move |url: &Url| {
                opened_clone.lock().unwrap().push(url.clone());
                Ok(())
            },
        ));

        let waiter = {
            let handshake = Arc::clone(&handshake);
            tokio::spawn(async move { handshake.request_derived_key(Network::Mainnet, "tok-1").await })
        };

        while handshake.pending_requests() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!handshake.complete(derive_callback("other")));
        assert!(handshake.complete(derive_callback("tok-1")));

        let info = waiter.await.unwrap().unwrap();
        assert_eq!(info.derived_public_key, "BC1YLderived");
        assert_eq!(opened.lock().unwrap().len(), 1);
        assert_eq!(handshake.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_reused_token_is_rejected_while_pending() {
        let handshake = Arc::new(CallbackHandshake::new(IdentityConfig::mainnet(), "com.example.app", |_: &Url| Ok(())));

        let first = {
            let handshake = Arc::clone(&handshake);
            tokio::spawn(async move { handshake.request_derived_key(Network::Mainnet, "tok-dup").await })
        };
        while handshake.pending_requests() == 0 {
            tokio::task::yield_now().await;
        }

        let err = handshake.request_derived_key(Network::Mainnet, "tok-dup").await.unwrap_err();
        assert!(matches!(err, IdentityError::HandshakeFailed(_)));
        assert_eq!(handshake.pending_requests(), 1);

        assert!(handshake.complete(derive_callback("tok-dup")));
        let info = first.await.unwrap().unwrap();
        assert_eq!(info.derived_public_key, "BC1YLderived");
        assert_eq!(handshake.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_failed_launch_leaves_nothing_pending() {
        let handshake = CallbackHandshake::new(IdentityConfig::mainnet(), "com.example.app", |_: &Url| {
            Err(IdentityError::HandshakeFailed("no browser".to_string()))
        });
        let err = handshake.request_derived_key(Network::Mainnet, "tok").await.unwrap_err();
        assert_eq!(err, IdentityError::HandshakeFailed("no browser".to_string()));
        assert_eq!(handshake.pending_requests(), 0);
    }

    #[test]
    fn test_generate_callback_token() {
        let a = generate_callback_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, generate_callback_token());
    }
}

//! Identity Facade
//!
//! Entry point of the SDK. Owns the configuration and the three
//! collaborators and sequences them: the handshake issues derived keys, the
//! key store persists them, the node supplies the facts every use of a key is
//! judged by.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::{fetch_authorization_facts, AuthorizationPolicy};
use crate::config::IdentityConfig;
use crate::error::{IdentityError, IdentityResult};
use crate::handshake::{generate_callback_token, AuthHandshake};
use crate::messages;
use crate::node::{AuthorizeDerivedKeyRequest, NodeApi};
use crate::store::KeyStore;
use crate::tx::{derived_key_extra_data, sign_transaction};
use crate::types::{DerivedKeyInfo, EncryptedMessagesThread, LoginResponse, LoginState, UnsignedTransaction};
use crate::utils::logging::{LogEntry, LogLevel};
use crate::{log_debug, log_info, log_warn};

pub struct Identity {
    config: IdentityConfig,
    policy: AuthorizationPolicy,
    store: Arc<dyn KeyStore>,
    node: Arc<dyn NodeApi>,
    handshake: Arc<dyn AuthHandshake>,
}

impl Identity {
    pub fn new(
        config: IdentityConfig,
        store: Arc<dyn KeyStore>,
        node: Arc<dyn NodeApi>,
        handshake: Arc<dyn AuthHandshake>,
    ) -> IdentityResult<Self> {
        config.validate()?;
        Ok(Self {
            policy: AuthorizationPolicy::from_config(&config),
            config,
            store,
            node,
            handshake,
        })
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    // =========================================================================
    // Login / Logout
    // =========================================================================

    /// Run the handshake, persist the issued derived key and judge it.
    ///
    /// Nothing is stored unless the handshake completes with a key that
    /// matches its seed and network.
    pub async fn login(&self, cancel: &CancellationToken) -> IdentityResult<LoginResponse> {
        let token = generate_callback_token();

        let info = tokio::select! {
            result = self.handshake.request_derived_key(self.config.network, &token) => result?,
            _ = cancel.cancelled() => {
                log_warn!("identity", "Login cancelled during handshake");
                return Err(IdentityError::Timeout("Login cancelled".to_string()));
            }
        };

        if info.network != self.config.network {
            return Err(IdentityError::HandshakeFailed(format!(
                "Derived key issued for {} but identity is configured for {}",
                info.network, self.config.network
            )));
        }
        info.validate(self.config.public_key_prefix_len)?;
        self.store.store_derived_key_info(&info)?;

        LogEntry::new(LogLevel::Info, "identity", "Derived key stored")
            .public_key_field("owner", &info.owner_public_key)
            .field("expiration_block", info.expiration_block)
            .log();

        let login_state = self.login_state(&info.owner_public_key, cancel).await?;
        Ok(LoginResponse {
            selected_public_key: info.owner_public_key.clone(),
            all_loaded_public_keys: self.store.owner_public_keys()?,
            login_state,
        })
    }

    /// Current [`LoginState`] of the stored derived key of `owner_public_key`
    pub async fn login_state(&self, owner_public_key: &str, cancel: &CancellationToken) -> IdentityResult<LoginState> {
        let info = self.stored_info(owner_public_key)?;
        self.evaluate(&info, cancel).await
    }

    /// Forget `owner_public_key` and its shared secrets. Returns the owners
    /// still logged in.
    pub fn logout(&self, owner_public_key: &str) -> IdentityResult<Vec<String>> {
        self.store.clear_derived_key_info(owner_public_key)?;
        self.store.clear_all_shared_secrets(owner_public_key)?;
        log_info!("identity", "Logged out", owner = owner_public_key);
        self.store.owner_public_keys()
    }

    pub fn logged_in_keys(&self) -> IdentityResult<Vec<String>> {
        self.store.owner_public_keys()
    }

    pub fn remove_all_keys(&self) -> IdentityResult<()> {
        self.store.clear_all()
    }

    /// JWT issued alongside the derived key of `owner_public_key`
    pub fn jwt(&self, owner_public_key: &str) -> IdentityResult<String> {
        let info = self.stored_info(owner_public_key)?;
        if info.jwt.is_empty() {
            return Err(IdentityError::NoDerivedKeyInfoFound(format!(
                "No JWT stored for {}",
                owner_public_key
            )));
        }
        Ok(info.jwt)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Sign `transaction` with the owner's derived key.
    ///
    /// The key must currently be [`LoginState::Authorized`]. The node tags
    /// the transaction with the derived public key before it is signed.
    pub async fn sign(&self, transaction: &UnsignedTransaction, cancel: &CancellationToken) -> IdentityResult<String> {
        let info = self.stored_info(&transaction.public_key)?;

        let state = self.evaluate(&info, cancel).await?;
        if !state.is_authorized() {
            return Err(IdentityError::NotAuthorized(state));
        }

        let extra_data = derived_key_extra_data(&info.derived_public_key, self.config.public_key_prefix_len)?;
        let tagged = self
            .node
            .append_extra_data(&transaction.transaction_hex, &extra_data)
            .await?;

        let signed = sign_transaction(&info.derived_seed_hex, &tagged)?;
        log_debug!("identity", "Transaction signed", transaction = signed);
        Ok(signed)
    }

    /// Submit a signed transaction, returning its hash
    pub async fn submit(&self, signed_transaction_hex: &str) -> IdentityResult<String> {
        let hash = self.node.submit_transaction(signed_transaction_hex).await?;
        log_info!("identity", "Transaction submitted", hash = hash);
        Ok(hash)
    }

    pub async fn sign_and_submit(
        &self,
        transaction: &UnsignedTransaction,
        cancel: &CancellationToken,
    ) -> IdentityResult<String> {
        let signed = self.sign(transaction, cancel).await?;
        self.submit(&signed).await
    }

    /// Register the stored derived key on chain. Returns the transaction hash.
    pub async fn authorize_derived_key(&self, owner_public_key: &str) -> IdentityResult<String> {
        let info = self.stored_info(owner_public_key)?;
        self.submit_authorization(&info, false).await
    }

    /// Revoke the stored derived key on chain and log the owner out.
    pub async fn deauthorize_derived_key(&self, owner_public_key: &str) -> IdentityResult<String> {
        let info = self.stored_info(owner_public_key)?;
        let hash = self.submit_authorization(&info, true).await?;
        self.logout(owner_public_key)?;
        Ok(hash)
    }

    async fn submit_authorization(&self, info: &DerivedKeyInfo, delete_key: bool) -> IdentityResult<String> {
        let request =
            AuthorizeDerivedKeyRequest::from_derived_key_info(info, delete_key, self.config.min_fee_rate_nanos_per_kb);
        let response = self.node.authorize_derived_key(&request).await?;

        // Signed by the derived key itself
        let signed = sign_transaction(&info.derived_seed_hex, &response.transaction_hex)?;
        self.submit(&signed).await
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Decrypt one thread of `owner_public_key`, in message order
    pub async fn decrypt_thread(
        &self,
        thread: &EncryptedMessagesThread,
        owner_public_key: &str,
        error_on_failure: bool,
    ) -> IdentityResult<Vec<String>> {
        let other = messages::counterparty(thread, owner_public_key).to_string();
        let mut decrypted = self
            .decrypt_threads(std::slice::from_ref(thread), owner_public_key, error_on_failure)
            .await?;
        Ok(decrypted.remove(&other).unwrap_or_default())
    }

    /// Decrypt several threads, keyed by counterparty public key
    pub async fn decrypt_threads(
        &self,
        threads: &[EncryptedMessagesThread],
        owner_public_key: &str,
        error_on_failure: bool,
    ) -> IdentityResult<HashMap<String, Vec<String>>> {
        let token = generate_callback_token();
        messages::decrypt_threads(
            self.store.as_ref(),
            self.handshake.as_ref(),
            owner_public_key,
            threads,
            error_on_failure,
            &token,
        )
        .await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn stored_info(&self, owner_public_key: &str) -> IdentityResult<DerivedKeyInfo> {
        self.store
            .derived_key_info(owner_public_key)?
            .ok_or_else(|| IdentityError::NoDerivedKeyInfoFound(owner_public_key.to_string()))
    }

    async fn evaluate(&self, info: &DerivedKeyInfo, cancel: &CancellationToken) -> IdentityResult<LoginState> {
        let facts = fetch_authorization_facts(self.node.as_ref(), info, self.config.remote_timeout, cancel).await?;
        let state = self.policy.decide(&facts);

        LogEntry::new(LogLevel::Debug, "identity", "Login state evaluated")
            .public_key_field("owner", &info.owner_public_key)
            .field("state", format!("{:?}", state))
            .field("block_height", facts.current_block_height)
            .log();
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EphemeralKeyStore;
    use crate::types::{Network, SharedSecret};
    use async_trait::async_trait;

    struct NoNode;

    #[async_trait]
    impl NodeApi for NoNode {
        async fn block_height(&self) -> IdentityResult<u64> {
            Err(IdentityError::RemoteReadFailed("offline".into()))
        }
        async fn balance_nanos(&self, _pk: &str) -> IdentityResult<u64> {
            Err(IdentityError::RemoteReadFailed("offline".into()))
        }
        async fn derived_key(&self, _o: &str, _d: &str) -> IdentityResult<Option<crate::types::OnChainDerivedKey>> {
            Err(IdentityError::RemoteReadFailed("offline".into()))
        }
        async fn append_extra_data(&self, _tx: &str, _e: &HashMap<String, String>) -> IdentityResult<String> {
            Err(IdentityError::RemoteReadFailed("offline".into()))
        }
        async fn submit_transaction(&self, _tx: &str) -> IdentityResult<String> {
            Err(IdentityError::RemoteReadFailed("offline".into()))
        }
        async fn authorize_derived_key(
            &self,
            _r: &AuthorizeDerivedKeyRequest,
        ) -> IdentityResult<crate::node::AuthorizeDerivedKeyResponse> {
            Err(IdentityError::RemoteReadFailed("offline".into()))
        }
    }

    struct PendingHandshake;

    #[async_trait]
    impl AuthHandshake for PendingHandshake {
        async fn request_derived_key(&self, _n: Network, _t: &str) -> IdentityResult<DerivedKeyInfo> {
            std::future::pending().await
        }
        async fn request_shared_secrets(&self, _o: &str, _c: &[String], _t: &str) -> IdentityResult<Vec<SharedSecret>> {
            std::future::pending().await
        }
    }

    fn identity(store: Arc<EphemeralKeyStore>) -> Identity {
        Identity::new(IdentityConfig::mainnet(), store, Arc::new(NoNode), Arc::new(PendingHandshake)).unwrap()
    }

    fn info(owner: &str) -> DerivedKeyInfo {
        DerivedKeyInfo {
            owner_public_key: owner.to_string(),
            derived_public_key: "derived".into(),
            derived_seed_hex: "01".into(),
            btc_deposit_address: String::new(),
            expiration_block: 100,
            access_signature: String::new(),
            network: Network::Mainnet,
            jwt: "owner.jwt".into(),
            derived_jwt: String::new(),
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = IdentityConfig::mainnet().with_node_url("http://node.example.com");
        let result = Identity::new(
            config,
            Arc::new(EphemeralKeyStore::new()),
            Arc::new(NoNode),
            Arc::new(PendingHandshake),
        );
        assert!(matches!(result, Err(IdentityError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_cancelled_login_stores_nothing() {
        let store = Arc::new(EphemeralKeyStore::new());
        let identity = identity(Arc::clone(&store));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = identity.login(&cancel).await.unwrap_err();
        assert!(matches!(err, IdentityError::Timeout(_)));
        assert!(store.owner_public_keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_owner() {
        let identity = identity(Arc::new(EphemeralKeyStore::new()));
        let tx = UnsignedTransaction::new("nobody", "0100");
        assert_eq!(
            identity.sign(&tx, &CancellationToken::new()).await.unwrap_err(),
            IdentityError::NoDerivedKeyInfoFound("nobody".into())
        );
        assert!(matches!(identity.jwt("nobody"), Err(IdentityError::NoDerivedKeyInfoFound(_))));
    }

    #[test]
    fn test_logout_clears_secrets() {
        let store = Arc::new(EphemeralKeyStore::new());
        store.store_derived_key_info(&info("alice")).unwrap();
        store.store_derived_key_info(&info("bob")).unwrap();
        store
            .store_shared_secret(&SharedSecret {
                secret: "01".into(),
                public_key: "alice".into(),
                other_public_key: "bob".into(),
            })
            .unwrap();

        let identity = identity(Arc::clone(&store));
        assert_eq!(identity.jwt("alice").unwrap(), "owner.jwt");
        assert_eq!(identity.logout("alice").unwrap(), vec!["bob"]);
        assert!(store.all_shared_secrets().unwrap().is_empty());

        identity.remove_all_keys().unwrap();
        assert!(identity.logged_in_keys().unwrap().is_empty());
    }
}

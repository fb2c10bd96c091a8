//! In-memory key store for tests and simulators

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{same_conversation, KeyStore};
use crate::error::{IdentityError, IdentityResult};
use crate::types::{DerivedKeyInfo, SharedSecret};

/// [`KeyStore`] that lives only as long as the process
#[derive(Debug, Default)]
pub struct EphemeralKeyStore {
    derived_keys: RwLock<BTreeMap<String, DerivedKeyInfo>>,
    shared_secrets: RwLock<Vec<SharedSecret>>,
}

impl EphemeralKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> IdentityError {
    IdentityError::StorageUnavailable("Key store lock poisoned".to_string())
}

impl KeyStore for EphemeralKeyStore {
    fn store_derived_key_info(&self, info: &DerivedKeyInfo) -> IdentityResult<()> {
        let mut keys = self.derived_keys.write().map_err(|_| poisoned())?;
        keys.insert(info.owner_public_key.clone(), info.clone());
        Ok(())
    }

    fn derived_key_info(&self, owner_public_key: &str) -> IdentityResult<Option<DerivedKeyInfo>> {
        let keys = self.derived_keys.read().map_err(|_| poisoned())?;
        Ok(keys.get(owner_public_key).cloned())
    }

    fn clear_derived_key_info(&self, owner_public_key: &str) -> IdentityResult<()> {
        let mut keys = self.derived_keys.write().map_err(|_| poisoned())?;
        keys.remove(owner_public_key);
        Ok(())
    }

    fn owner_public_keys(&self) -> IdentityResult<Vec<String>> {
        let keys = self.derived_keys.read().map_err(|_| poisoned())?;
        Ok(keys.keys().cloned().collect())
    }

    fn store_shared_secret(&self, secret: &SharedSecret) -> IdentityResult<()> {
        let mut secrets = self.shared_secrets.write().map_err(|_| poisoned())?;
        secrets.retain(|s| !same_conversation(s, &secret.public_key, &secret.other_public_key));
        secrets.push(secret.clone());
        Ok(())
    }

    fn shared_secret(&self, owner_public_key: &str, other_public_key: &str) -> IdentityResult<Option<SharedSecret>> {
        let secrets = self.shared_secrets.read().map_err(|_| poisoned())?;
        Ok(secrets
            .iter()
            .find(|s| same_conversation(s, owner_public_key, other_public_key))
            .cloned())
    }

    fn clear_shared_secret(&self, owner_public_key: &str, other_public_key: &str) -> IdentityResult<()> {
        let mut secrets = self.shared_secrets.write().map_err(|_| poisoned())?;
        secrets.retain(|s| !same_conversation(s, owner_public_key, other_public_key));
        Ok(())
    }

    fn clear_all_shared_secrets(&self, owner_public_key: &str) -> IdentityResult<()> {
        let mut secrets = self.shared_secrets.write().map_err(|_| poisoned())?;
        secrets.retain(|s| s.public_key != owner_public_key);
        Ok(())
    }

    fn all_shared_secrets(&self) -> IdentityResult<Vec<SharedSecret>> {
        let secrets = self.shared_secrets.read().map_err(|_| poisoned())?;
        Ok(secrets.clone())
    }

    fn clear_all(&self) -> IdentityResult<()> {
        self.derived_keys.write().map_err(|_| poisoned())?.clear();
        self.shared_secrets.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Network;

    fn info(owner: &str) -> DerivedKeyInfo {
        DerivedKeyInfo {
            owner_public_key: owner.to_string(),
            derived_public_key: format!("{}-derived", owner),
            derived_seed_hex: "01".to_string(),
            btc_deposit_address: String::new(),
            expiration_block: 100,
            access_signature: String::new(),
            network: Network::Mainnet,
            jwt: String::new(),
            derived_jwt: String::new(),
        }
    }

    fn secret(owner: &str, other: &str, value: &str) -> SharedSecret {
        SharedSecret {
            secret: value.to_string(),
            public_key: owner.to_string(),
            other_public_key: other.to_string(),
        }
    }

    #[test]
    fn test_derived_key_lifecycle() {
        let store = EphemeralKeyStore::new();
        assert_eq!(store.derived_key_info("bob").unwrap(), None);

        store.store_derived_key_info(&info("bob")).unwrap();
        store.store_derived_key_info(&info("alice")).unwrap();
        assert_eq!(store.owner_public_keys().unwrap(), vec!["alice", "bob"]);
        assert_eq!(store.derived_key_info("bob").unwrap(), Some(info("bob")));

        store.clear_derived_key_info("bob").unwrap();
        assert_eq!(store.derived_key_info("bob").unwrap(), None);
        assert_eq!(store.owner_public_keys().unwrap(), vec!["alice"]);
    }

    #[test]
    fn test_shared_secret_replaces_same_conversation() {
        let store = EphemeralKeyStore::new();
        store.store_shared_secret(&secret("me", "you", "01")).unwrap();
        store.store_shared_secret(&secret("me", "you", "02")).unwrap();
        store.store_shared_secret(&secret("me", "them", "03")).unwrap();

        assert_eq!(store.all_shared_secrets().unwrap().len(), 2);
        assert_eq!(store.shared_secret("me", "you").unwrap().unwrap().secret, "02");
        assert_eq!(store.shared_secret("you", "me").unwrap(), None);
    }

    #[test]
    fn test_clearing_shared_secrets() {
        let store = EphemeralKeyStore::new();
        store.store_shared_secret(&secret("me", "you", "01")).unwrap();
        store.store_shared_secret(&secret("me", "them", "02")).unwrap();
        store.store_shared_secret(&secret("other", "you", "03")).unwrap();

        store.clear_shared_secret("me", "you").unwrap();
        assert_eq!(store.shared_secret("me", "you").unwrap(), None);

        store.clear_all_shared_secrets("me").unwrap();
        let remaining = store.all_shared_secrets().unwrap();
        assert_eq!(remaining, vec![secret("other", "you", "03")]);

        store.store_derived_key_info(&info("me")).unwrap();
        store.clear_all().unwrap();
        assert!(store.all_shared_secrets().unwrap().is_empty());
        assert!(store.owner_public_keys().unwrap().is_empty());
    }
}

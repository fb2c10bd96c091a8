//! Persistent key store over an opaque secure blob storage
//!
//! Two JSON blobs are kept: `derivedKeyInfo` (map of owner to derived key)
//! and `sharedSecrets` (list). Every write is a read-modify-write of the
//! whole blob, serialized by a per-store mutex. Reads take no lock since the
//! backend replaces blobs atomically.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use super::{same_conversation, KeyStore};
use crate::error::{IdentityError, IdentityResult};
use crate::log_debug;
use crate::types::{DerivedKeyInfo, SharedSecret};

pub const DERIVED_KEY_INFO_KEY: &str = "derivedKeyInfo";
pub const SHARED_SECRETS_KEY: &str = "sharedSecrets";

/// Opaque get / set / remove of byte blobs, e.g. an OS keychain
pub trait SecureStorage: Send + Sync {
    fn get_data(&self, key: &str) -> IdentityResult<Option<Vec<u8>>>;

    fn set_data(&self, key: &str, data: &[u8]) -> IdentityResult<()>;

    fn remove(&self, key: &str) -> IdentityResult<()>;
}

// =============================================================================
// Key Store
// =============================================================================

type DerivedKeyMap = BTreeMap<String, DerivedKeyInfo>;

pub struct PersistentKeyStore<S: SecureStorage> {
    storage: S,
    write_lock: Mutex<()>,
}

impl<S: SecureStorage> PersistentKeyStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn read_blob<T: DeserializeOwned + Default>(&self, key: &str) -> IdentityResult<T> {
        match self.storage.get_data(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| IdentityError::StorageUnavailable(format!("Corrupt '{}' blob: {}", key, e))),
            None => Ok(T::default()),
        }
    }

    fn write_blob<T: Serialize>(&self, key: &str, value: &T) -> IdentityResult<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| IdentityError::StorageUnavailable(format!("Cannot encode '{}' blob: {}", key, e)))?;
        let bytes = Zeroizing::new(bytes);
        self.storage.set_data(key, &bytes)
    }

    /// Read-modify-write of one blob under the store's write lock
    fn update<T, F>(&self, key: &str, mutate: F) -> IdentityResult<()>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| IdentityError::StorageUnavailable("Key store lock poisoned".to_string()))?;

        let mut value: T = self.read_blob(key)?;
        mutate(&mut value);
        self.write_blob(key, &value)?;

        log_debug!("store", "Updated blob", blob = key);
        Ok(())
    }
}

impl<S: SecureStorage> KeyStore for PersistentKeyStore<S> {
    fn store_derived_key_info(&self, info: &DerivedKeyInfo) -> IdentityResult<()> {
        self.update::<DerivedKeyMap, _>(DERIVED_KEY_INFO_KEY, |keys| {
            keys.insert(info.owner_public_key.clone(), info.clone());
        })
    }

    fn derived_key_info(&self, owner_public_key: &str) -> IdentityResult<Option<DerivedKeyInfo>> {
        let mut keys: DerivedKeyMap = self.read_blob(DERIVED_KEY_INFO_KEY)?;
        Ok(keys.remove(owner_public_key))
    }

    fn clear_derived_key_info(&self, owner_public_key: &str) -> IdentityResult<()> {
        self.update::<DerivedKeyMap, _>(DERIVED_KEY_INFO_KEY, |keys| {
            keys.remove(owner_public_key);
        })
    }

    fn owner_public_keys(&self) -> IdentityResult<Vec<String>> {
        let keys: DerivedKeyMap = self.read_blob(DERIVED_KEY_INFO_KEY)?;
        Ok(keys.into_keys().collect())
    }

    fn store_shared_secret(&self, secret: &SharedSecret) -> IdentityResult<()> {
        self.update::<Vec<SharedSecret>, _>(SHARED_SECRETS_KEY, |secrets| {
            secrets.retain(|s| !same_conversation(s, &secret.public_key, &secret.other_public_key));
            secrets.push(secret.clone());
        })
    }

    fn shared_secret(&self, owner_public_key: &str, other_public_key: &str) -> IdentityResult<Option<SharedSecret>> {
        let secrets: Vec<SharedSecret> = self.read_blob(SHARED_SECRETS_KEY)?;
        Ok(secrets
            .into_iter()
            .find(|s| same_conversation(s, owner_public_key, other_public_key)))
    }

    fn clear_shared_secret(&self, owner_public_key: &str, other_public_key: &str) -> IdentityResult<()> {
        self.update::<Vec<SharedSecret>, _>(SHARED_SECRETS_KEY, |secrets| {
            secrets.retain(|s| !same_conversation(s, owner_public_key, other_public_key));
        })
    }

    fn clear_all_shared_secrets(&self, owner_public_key: &str) -> IdentityResult<()> {
        self.update::<Vec<SharedSecret>, _>(SHARED_SECRETS_KEY, |secrets| {
            secrets.retain(|s| s.public_key != owner_public_key);
        })
    }

    fn all_shared_secrets(&self) -> IdentityResult<Vec<SharedSecret>> {
        self.read_blob(SHARED_SECRETS_KEY)
    }

    /// Secrets go first: a failure part way leaves derived keys without
    /// their secrets, never secrets without an owner.
    fn clear_all(&self) -> IdentityResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| IdentityError::StorageUnavailable("Key store lock poisoned".to_string()))?;
        self.storage.remove(SHARED_SECRETS_KEY)?;
        self.storage.remove(DERIVED_KEY_INFO_KEY)
    }
}

// =============================================================================
// Storage Backends
// =============================================================================

/// Blob storage held in process memory; values are wiped when replaced
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStorage for MemoryStorage {
    fn get_data(&self, key: &str) -> IdentityResult<Option<Vec<u8>>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| IdentityError::StorageUnavailable("Storage lock poisoned".to_string()))?;
        Ok(blobs.get(key).map(|b| b.to_vec()))
    }

    fn set_data(&self, key: &str, data: &[u8]) -> IdentityResult<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| IdentityError::StorageUnavailable("Storage lock poisoned".to_string()))?;
        blobs.insert(key.to_string(), Zeroizing::new(data.to_vec()));
        Ok(())
    }

    fn remove(&self, key: &str) -> IdentityResult<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| IdentityError::StorageUnavailable("Storage lock poisoned".to_string()))?;
        blobs.remove(key);
        Ok(())
    }
}

/// One file per blob inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader sees either the old or the new blob.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory
    pub fn open(dir: impl AsRef<Path>) -> IdentityResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> IdentityResult<PathBuf> {
        let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(IdentityError::StorageUnavailable(format!("Invalid storage key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl SecureStorage for FileStorage {
    fn get_data(&self, key: &str) -> IdentityResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_data(&self, key: &str, data: &[u8]) -> IdentityResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> IdentityResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

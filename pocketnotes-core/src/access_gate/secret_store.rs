//! Secure key-value storage for the access secret
//!
//! Builds with the `keyring` feature default to the OS-native store
//! (Keychain, Credential Vault, Secret Service). Otherwise the secret goes
//! to a RON file next to the database, written atomically with `0o600`
//! permissions:
//!
//! ```ron
//! (
//!     entries: {
//!         "privateTabPassword": "1234",
//!     },
//! )
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{Config, SecretBackend};
use crate::error::{ConfigError, CredentialResult};

/// Key-value secret storage backend
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> CredentialResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> CredentialResult<()>;

    /// Remove an entry. Returns true if it existed.
    fn remove(&self, key: &str) -> CredentialResult<bool>;
}

impl<S: SecretStore + ?Sized> SecretStore for Box<S> {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> CredentialResult<bool> {
        (**self).remove(key)
    }
}

/// On-disk shape of the secrets file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SecretsFileContent {
    #[serde(default)]
    pub entries: BTreeMap<String, String>,
}

/// RON-file secret store
pub struct SecretsFile {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl SecretsFile {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> CredentialResult<SecretsFileContent> {
        if !self.path.exists() {
            return Ok(SecretsFileContent::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(SecretsFileContent::default());
        }

        Ok(ron::from_str(&content)?)
    }

    fn write(&self, content: &SecretsFileContent) -> CredentialResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pretty = ron::ser::PrettyConfig::default();
        let serialized = ron::ser::to_string_pretty(content, pretty)?;
        write_atomic(&self.path, serialized.as_bytes())?;
        Ok(())
    }
}

/// Write to a sibling temp file created owner-only, then rename over `path`.
/// Readers see either the old file or the new one, never a partial write.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    // A leftover from an interrupted write may carry other permissions
    if tmp_path.exists() {
        std::fs::remove_file(&tmp_path)?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)
}

impl SecretStore for SecretsFile {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read()?.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        let _guard = self.lock.lock();
        let mut content = self.read()?;
        content.entries.insert(key.to_string(), value.to_string());
        self.write(&content)
    }

    fn remove(&self, key: &str) -> CredentialResult<bool> {
        let _guard = self.lock.lock();
        let mut content = self.read()?;
        let existed = content.entries.remove(key).is_some();
        if existed {
            self.write(&content)?;
        }
        Ok(existed)
    }
}

/// OS keyring secret store, one entry per key under service `pocketnotes`
#[cfg(feature = "keyring")]
pub struct KeyringStore {
    service: String,
}

#[cfg(feature = "keyring")]
impl KeyringStore {
    pub const SERVICE: &'static str = "pocketnotes";

    pub fn new() -> Self {
        Self {
            service: Self::SERVICE.to_string(),
        }
    }

    fn entry(&self, key: &str) -> CredentialResult<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| crate::error::CredentialError::Keyring(e.to_string()))
    }
}

#[cfg(feature = "keyring")]
impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "keyring")]
impl SecretStore for KeyringStore {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(crate::error::CredentialError::Keyring(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| crate::error::CredentialError::Keyring(e.to_string()))
    }

    fn remove(&self, key: &str) -> CredentialResult<bool> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(crate::error::CredentialError::Keyring(e.to_string())),
        }
    }
}

/// In-process secret store; nothing survives the process.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CredentialResult<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

/// Build the secret store selected by `config`.
pub fn open_secret_store(config: &Config) -> Result<Box<dyn SecretStore>, ConfigError> {
    log::debug!("[ACCESS] Using {} secret backend", config.secret_backend.as_str());
    match config.secret_backend {
        SecretBackend::File => Ok(Box::new(SecretsFile::with_path(config.secrets_file.clone()))),
        SecretBackend::Memory => Ok(Box::new(MemorySecretStore::new())),
        #[cfg(feature = "keyring")]
        SecretBackend::Keyring => Ok(Box::new(KeyringStore::new())),
        #[cfg(not(feature = "keyring"))]
        SecretBackend::Keyring => Err(ConfigError::UnsupportedBackend("keyring")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_secrets_file_round_trip() {
        let dir = tempdir().unwrap();
        let store = SecretsFile::with_path(dir.path().join("nested").join("secrets.ron"));

        assert_eq!(store.get("privateTabPassword").unwrap(), None);
        store.set("privateTabPassword", "1234").unwrap();
        assert_eq!(store.get("privateTabPassword").unwrap().as_deref(), Some("1234"));

        // A second handle sees what the first wrote
        let reopened = SecretsFile::with_path(store.path().to_path_buf());
        assert_eq!(reopened.get("privateTabPassword").unwrap().as_deref(), Some("1234"));

        assert!(reopened.remove("privateTabPassword").unwrap());
        assert!(!reopened.remove("privateTabPassword").unwrap());
        assert_eq!(store.get("privateTabPassword").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_secrets_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.ron");
        let store = SecretsFile::with_path(&path);
        store.set("k", "v").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_write_replaces_file_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.ron");
        let store = SecretsFile::with_path(&path);
        store.set("k", "first").unwrap();
        store.set("k", "second").unwrap();

        assert_eq!(store.get("k").unwrap().as_deref(), Some("second"));
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("secrets.ron")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_temp_file_is_not_reused() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.ron");
        let stale = dir.path().join("secrets.tmp");
        std::fs::write(&stale, "garbage").unwrap();
        std::fs::set_permissions(&stale, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = SecretsFile::with_path(&path);
        store.set("k", "v").unwrap();

        assert!(!stale.exists());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_empty_secrets_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.ron");
        std::fs::write(&path, "\n").unwrap();

        let store = SecretsFile::with_path(&path);
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_garbled_secrets_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.ron");
        std::fs::write(&path, "not ron {{").unwrap();

        let store = SecretsFile::with_path(&path);
        assert!(matches!(
            store.get("k"),
            Err(crate::error::CredentialError::Parse(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySecretStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert!(store.remove("k").unwrap());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_open_secret_store_by_backend() {
        let dir = tempdir().unwrap();
        let config = Config {
            database_url: ":memory:".to_string(),
            secrets_file: dir.path().join("secrets.ron"),
            secret_backend: SecretBackend::File,
        };
        let store = open_secret_store(&config).unwrap();
        store.set("k", "v").unwrap();
        assert!(config.secrets_file.exists());

        #[cfg(not(feature = "keyring"))]
        {
            let keyring = Config {
                secret_backend: SecretBackend::Keyring,
                ..config
            };
            assert_eq!(
                open_secret_store(&keyring).err(),
                Some(ConfigError::UnsupportedBackend("keyring"))
            );
        }
    }
}

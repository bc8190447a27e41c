use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// Path of the RON secrets file used by the `file` backend.
    pub const SECRETS_FILE: &str = "SECRETS_FILE";
    /// One of `file`, `keyring`, `memory`.
    pub const SECRET_BACKEND: &str = "SECRET_BACKEND";
}

/// Default values
pub mod defaults {
    pub const DATABASE_URL: &str = "./.db/pocketnotes.db";
    pub const SECRETS_FILE: &str = "./.db/secrets.ron";
    /// The OS keyring when compiled in, otherwise the owner-only secrets file.
    #[cfg(feature = "keyring")]
    pub const SECRET_BACKEND: &str = "keyring";
    #[cfg(not(feature = "keyring"))]
    pub const SECRET_BACKEND: &str = "file";
}

/// Where the access secret is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretBackend {
    File,
    Keyring,
    Memory,
}

impl SecretBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretBackend::File => "file",
            SecretBackend::Keyring => "keyring",
            SecretBackend::Memory => "memory",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Some(SecretBackend::File),
            "keyring" => Some(SecretBackend::Keyring),
            "memory" => Some(SecretBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub secrets_file: PathBuf,
    pub secret_backend: SecretBackend,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let backend_raw = non_empty(env_vars::SECRET_BACKEND)
            .unwrap_or_else(|| defaults::SECRET_BACKEND.to_string());
        let secret_backend =
            SecretBackend::from_str(&backend_raw).ok_or(ConfigError::InvalidValue {
                var: env_vars::SECRET_BACKEND,
                value: backend_raw.clone(),
            })?;

        Ok(Self {
            database_url: non_empty(env_vars::DATABASE_URL)
                .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            secrets_file: non_empty(env_vars::SECRETS_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(defaults::SECRETS_FILE)),
            secret_backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.database_url, defaults::DATABASE_URL);
        assert_eq!(config.secrets_file, PathBuf::from(defaults::SECRETS_FILE));
        #[cfg(feature = "keyring")]
        assert_eq!(config.secret_backend, SecretBackend::Keyring);
        #[cfg(not(feature = "keyring"))]
        assert_eq!(config.secret_backend, SecretBackend::File);
    }

    #[test]
    fn test_default_backend_is_buildable() {
        let backend = SecretBackend::from_str(defaults::SECRET_BACKEND).unwrap();
        assert_eq!(backend == SecretBackend::Keyring, cfg!(feature = "keyring"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (env_vars::DATABASE_URL, "/tmp/notes.db"),
            (env_vars::SECRETS_FILE, "/tmp/secrets.ron"),
            (env_vars::SECRET_BACKEND, "Memory"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "/tmp/notes.db");
        assert_eq!(config.secrets_file, PathBuf::from("/tmp/secrets.ron"));
        assert_eq!(config.secret_backend, SecretBackend::Memory);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[(env_vars::DATABASE_URL, "  ")])).unwrap();
        assert_eq!(config.database_url, defaults::DATABASE_URL);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[(env_vars::SECRET_BACKEND, "vault")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: env_vars::SECRET_BACKEND,
                value: "vault".to_string(),
            }
        );
    }
}

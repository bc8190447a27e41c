//! Password gate in front of the private notes.
//!
//! This is an access-control convenience, not encryption: private notes
//! sit in the same database as public ones, and the secret is compared
//! as a plain string. A successful `verify` grants nothing persistent;
//! callers check again on every entry into private content.

pub mod secret_store;

pub use secret_store::{open_secret_store, MemorySecretStore, SecretStore, SecretsFile};

#[cfg(feature = "keyring")]
pub use secret_store::KeyringStore;

use crate::error::{AccessResult, ValidationError};

/// Key under which the secret is stored.
pub const SECRET_KEY: &str = "privateTabPassword";

/// Minimum secret length, in characters.
pub const MIN_SECRET_LEN: usize = 4;

/// Which form to show before private content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// No secret yet: ask for a new one.
    Create,
    /// Secret set: ask for it (a reset is offered from here).
    Enter,
}

pub struct AccessGate<S: SecretStore> {
    store: S,
}

impl<S: SecretStore> AccessGate<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored secret, with an empty value treated as unset.
    fn stored_secret(&self) -> AccessResult<Option<String>> {
        Ok(self.store.get(SECRET_KEY)?.filter(|s| !s.is_empty()))
    }

    pub fn is_secret_set(&self) -> AccessResult<bool> {
        Ok(self.stored_secret()?.is_some())
    }

    pub fn prompt_mode(&self) -> AccessResult<PromptMode> {
        if self.is_secret_set()? {
            Ok(PromptMode::Enter)
        } else {
            Ok(PromptMode::Create)
        }
    }

    /// Check `attempt` against the stored secret.
    pub fn verify(&self, attempt: &str) -> AccessResult<()> {
        let Some(secret) = self.stored_secret()? else {
            return Err(ValidationError::PasswordNotSet.into());
        };

        if attempt != secret {
            log::warn!("[ACCESS] Rejected incorrect password");
            return Err(ValidationError::IncorrectPassword.into());
        }

        log::debug!("[ACCESS] Access granted");
        Ok(())
    }

    /// Set the first secret (`current = None`) or replace an existing one.
    ///
    /// Replacing requires the current secret; on any validation failure
    /// the stored secret is left as it was.
    pub fn set_or_reset(&self, current: Option<&str>, new_secret: &str) -> AccessResult<()> {
        match (self.stored_secret()?, current) {
            (None, _) => {
                if !long_enough(new_secret) {
                    return Err(ValidationError::TooShort.into());
                }
                self.store.set(SECRET_KEY, new_secret)?;
                log::info!("[ACCESS] Password created");
            }
            (Some(_), None) => {
                return Err(ValidationError::CurrentPasswordRequired.into());
            }
            (Some(secret), Some(current)) => {
                if current != secret {
                    log::warn!("[ACCESS] Password reset rejected: current password mismatch");
                    return Err(ValidationError::IncorrectCurrentPassword.into());
                }
                if !long_enough(new_secret) {
                    return Err(ValidationError::NewPasswordTooShort.into());
                }
                self.store.set(SECRET_KEY, new_secret)?;
                log::info!("[ACCESS] Password reset");
            }
        }
        Ok(())
    }
}

fn long_enough(secret: &str) -> bool {
    secret.chars().count() >= MIN_SECRET_LEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;

    fn gate() -> AccessGate<MemorySecretStore> {
        AccessGate::new(MemorySecretStore::new())
    }

    fn validation<T: std::fmt::Debug>(result: AccessResult<T>) -> ValidationError {
        result
            .unwrap_err()
            .validation()
            .expect("expected a validation error")
    }

    #[test]
    fn test_create_then_verify() {
        let gate = gate();
        assert!(!gate.is_secret_set().unwrap());
        assert_eq!(gate.prompt_mode().unwrap(), PromptMode::Create);

        gate.set_or_reset(None, "1234").unwrap();

        assert!(gate.is_secret_set().unwrap());
        assert_eq!(gate.prompt_mode().unwrap(), PromptMode::Enter);
        gate.verify("1234").unwrap();
        assert_eq!(validation(gate.verify("0000")), ValidationError::IncorrectPassword);
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let gate = gate();
        assert_eq!(validation(gate.set_or_reset(None, "12")), ValidationError::TooShort);
        assert!(!gate.is_secret_set().unwrap());
    }

    #[test]
    fn test_reset_requires_correct_current() {
        let gate = gate();
        gate.set_or_reset(None, "1234").unwrap();

        assert_eq!(
            validation(gate.set_or_reset(Some("9999"), "5678")),
            ValidationError::IncorrectCurrentPassword
        );
        gate.verify("1234").unwrap();

        gate.set_or_reset(Some("1234"), "5678").unwrap();
        gate.verify("5678").unwrap();
        assert_eq!(validation(gate.verify("1234")), ValidationError::IncorrectPassword);
    }

    #[test]
    fn test_reset_new_too_short() {
        let gate = gate();
        gate.set_or_reset(None, "1234").unwrap();

        assert_eq!(
            validation(gate.set_or_reset(Some("1234"), "5")),
            ValidationError::NewPasswordTooShort
        );
        gate.verify("1234").unwrap();
    }

    #[test]
    fn test_set_secret_cannot_be_overwritten_without_proof() {
        let gate = gate();
        gate.set_or_reset(None, "1234").unwrap();

        assert_eq!(
            validation(gate.set_or_reset(None, "5678")),
            ValidationError::CurrentPasswordRequired
        );
        gate.verify("1234").unwrap();
    }

    #[test]
    fn test_verify_when_unset() {
        let gate = gate();
        assert_eq!(validation(gate.verify("1234")), ValidationError::PasswordNotSet);
    }

    #[test]
    fn test_empty_stored_secret_counts_as_unset() {
        let gate = gate();
        gate.store().set(SECRET_KEY, "").unwrap();

        assert!(!gate.is_secret_set().unwrap());
        assert_eq!(validation(gate.verify("")), ValidationError::PasswordNotSet);
        gate.set_or_reset(None, "4321").unwrap();
        gate.verify("4321").unwrap();
    }

    #[test]
    fn test_length_counts_characters() {
        let gate = gate();
        // Four characters, more than four bytes
        gate.set_or_reset(None, "ééé1").unwrap();
        gate.verify("ééé1").unwrap();
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ValidationError::TooShort.to_string(),
            "Password must be at least 4 characters"
        );
        assert_eq!(ValidationError::IncorrectPassword.to_string(), "Incorrect password");
        assert_eq!(
            ValidationError::IncorrectCurrentPassword.to_string(),
            "Current password is incorrect"
        );
        assert_eq!(
            ValidationError::NewPasswordTooShort.to_string(),
            "New password must be at least 4 characters"
        );
    }

    #[test]
    fn test_secret_persists_in_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.ron");

        AccessGate::new(SecretsFile::with_path(&path))
            .set_or_reset(None, "2468")
            .unwrap();

        let reopened = AccessGate::new(SecretsFile::with_path(&path));
        assert_eq!(reopened.prompt_mode().unwrap(), PromptMode::Enter);
        reopened.verify("2468").unwrap();
    }

    #[test]
    fn test_store_failure_is_credential_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.ron");
        std::fs::write(&path, "(entries: {").unwrap();

        let gate = AccessGate::new(SecretsFile::with_path(&path));
        assert!(matches!(gate.verify("1234"), Err(AccessError::Credential(_))));
    }
}

//! Error types for the note store, the access gate and configuration

use thiserror::Error;

use crate::access_gate::MIN_SECRET_LEN;
use crate::models::NoteId;

/// Note store error type
#[derive(Error, Debug)]
pub enum StoreError {
    /// Migration failed; the store cannot be used
    #[error("Schema error: {0}")]
    Schema(String),

    /// Referenced note does not exist
    #[error("Note not found: {0}")]
    NotFound(NoteId),

    /// Underlying SQLite read or write failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Filesystem error while preparing the database location
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be turned back into a note
    #[error("Corrupt note record {id}: {reason}")]
    CorruptRecord { id: NoteId, reason: String },
}

/// Result type for note store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// User-facing validation failures from the access gate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Password must be at least {} characters", MIN_SECRET_LEN)]
    TooShort,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("No password has been set")]
    PasswordNotSet,

    #[error("Current password is incorrect")]
    IncorrectCurrentPassword,

    #[error("New password must be at least {} characters", MIN_SECRET_LEN)]
    NewPasswordTooShort,

    #[error("Current password is required to change the password")]
    CurrentPasswordRequired,
}

/// Errors from secret store backends
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("secret store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("secret store serialization error: {0}")]
    Serialize(#[from] ron::Error),

    #[error("secret store parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("keyring error: {0}")]
    Keyring(String),
}

pub type CredentialResult<T> = Result<T, CredentialError>;

/// Access gate error: either the user got something wrong, or the
/// secret store failed.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl AccessError {
    /// The validation failure, if this is one.
    pub fn validation(&self) -> Option<ValidationError> {
        match self {
            AccessError::Validation(v) => Some(*v),
            AccessError::Credential(_) => None,
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Secret backend '{0}' is not available in this build")]
    UnsupportedBackend(&'static str),
}

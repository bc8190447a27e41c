//! Personal note storage: a SQLite-backed note store, an observable
//! in-memory cache for list views, and a password gate in front of the
//! private notes.

pub mod access_gate;
pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod models;

pub use access_gate::{AccessGate, PromptMode, SecretStore};
pub use config::Config;
pub use db::{Database, NotesCache, NotesSubscription};
pub use editor::{EditTarget, NoteEditor, SaveOutcome};
pub use error::{AccessError, ConfigError, StoreError, ValidationError};
pub use models::{NewNote, Note, NoteId, NotePatch, Visibility};

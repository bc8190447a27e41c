pub mod notes_cache;
pub mod schema;
pub mod sqlite;
pub mod tables;

pub use notes_cache::{NotesCache, NotesSnapshot, NotesSubscription};
pub use sqlite::Database;

//! Database handle for the embedded note store.
//!
//! One SQLite connection behind a mutex. The application has a single
//! writer, so no pool is needed; the handle is created once at startup,
//! after the schema is migrated, and shared as `Arc<Database>`.

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::schema;
use crate::error::StoreResult;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);
const IN_MEMORY: &str = ":memory:";

pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path` and bring its schema up to date.
    ///
    /// A migration failure is returned as [`StoreError::Schema`](crate::error::StoreError::Schema)
    /// and no handle is produced.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if path.to_str() == Some(IN_MEMORY) {
            return Self::open_in_memory();
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        log::info!("[DB] Opening note database at {}", path.display());
        let conn = Connection::open(path)?;
        Self::initialize(conn, true)
    }

    /// Open a private in-memory database (tests, ephemeral sessions).
    pub fn open_in_memory() -> StoreResult<Self> {
        log::debug!("[DB] Opening in-memory note database");
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, false)
    }

    fn initialize(mut conn: Connection, on_disk: bool) -> StoreResult<Self> {
        if on_disk {
            let mode: String =
                conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
            log::debug!("[DB] journal_mode = {}", mode);
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        schema::apply_migrations(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the underlying connection.
    pub fn with_connection<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Schema version recorded in the database file.
    pub fn schema_version(&self) -> StoreResult<i32> {
        let conn = self.conn.lock();
        schema::current_version(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory_applies_schema() {
        let db = Database::open_in_memory().expect("Failed to open database");
        assert_eq!(db.schema_version().unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join(".db").join("notes.db");

        let db = Database::open(&db_path).expect("Failed to open database");
        assert!(db_path.exists());

        let mode: String = db
            .with_connection(|conn| {
                Ok(conn.query_row("PRAGMA journal_mode;", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_memory_path_opens_in_memory() {
        let db = Database::open(":memory:").expect("Failed to open database");
        assert_eq!(db.schema_version().unwrap(), 1);
    }

    #[test]
    fn test_open_fails_with_schema_error_when_migration_cannot_apply() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("notes.db");
        {
            // A table holding the index's name makes the v1 DDL fail
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch("CREATE TABLE idx_modifiedDate (x INTEGER);").unwrap();
        }

        let Err(err) = Database::open(&db_path) else {
            panic!("open should fail when the schema cannot be applied");
        };
        assert!(matches!(err, StoreError::Schema(_)), "unexpected error: {}", err);

        let conn = Connection::open(&db_path).unwrap();
        assert_eq!(schema::current_version(&conn).unwrap(), 0);
        let notes_tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'notes'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(notes_tables, 0);
    }
}

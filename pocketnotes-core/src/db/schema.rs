//! Schema management and migrations
//!
//! The version marker is SQLite's `PRAGMA user_version`. Each pending
//! migration runs in its own transaction together with the marker bump,
//! and its DDL only uses `IF NOT EXISTS` so it is safe to run again.

use rusqlite::Connection;

use crate::error::{StoreError, StoreResult};

/// Schema version - increment when adding a migration
pub const SCHEMA_VERSION: i32 = 1;

pub(crate) struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "notes table with modifiedDate index",
    sql: SCHEMA_V1,
}];

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    content TEXT,
    modifiedDate TEXT,
    isPrivate INTEGER DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_modifiedDate ON notes (modifiedDate);
"#;

/// Apply all pending migrations up to [`SCHEMA_VERSION`].
pub fn apply_migrations(conn: &mut Connection) -> StoreResult<()> {
    apply_migrations_from(conn, MIGRATIONS, SCHEMA_VERSION)
}

pub(crate) fn apply_migrations_from(
    conn: &mut Connection,
    migrations: &[Migration],
    target: i32,
) -> StoreResult<()> {
    let current = current_version(conn)?;
    log::debug!("[SCHEMA] current version {}, target {}", current, target);

    if current > target {
        log::warn!(
            "[SCHEMA] Database is at version {} but this build expects {}; leaving it untouched",
            current,
            target
        );
        return Ok(());
    }
    if current == target {
        return Ok(());
    }

    log::info!("[SCHEMA] Migrating from version {} to {}", current, target);
    for migration in migrations
        .iter()
        .filter(|m| m.version > current && m.version <= target)
    {
        apply_migration(conn, migration)?;
    }

    Ok(())
}

fn apply_migration(conn: &mut Connection, migration: &Migration) -> StoreResult<()> {
    let schema_err = |e: rusqlite::Error| {
        StoreError::Schema(format!(
            "Failed to apply v{} schema ({}): {}",
            migration.version, migration.description, e
        ))
    };

    let tx = conn.transaction().map_err(schema_err)?;
    tx.execute_batch(migration.sql).map_err(schema_err)?;
    tx.pragma_update(None, "user_version", migration.version)
        .map_err(schema_err)?;
    tx.commit().map_err(schema_err)?;

    log::info!(
        "[SCHEMA] Migration v{} applied: {}",
        migration.version,
        migration.description
    );
    Ok(())
}

/// Read the persisted schema version (0 for a fresh database).
pub fn current_version(conn: &Connection) -> StoreResult<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StoreError::Schema(format!("Failed to read schema version: {}", e)))
}

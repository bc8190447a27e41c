//! Note database operations

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::super::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    format_timestamp, fresh_timestamp, parse_timestamp, NewNote, Note, NoteId, NotePatch,
    Visibility,
};

const NOTE_COLUMNS: &str = "id, title, content, modifiedDate, isPrivate";
const CANONICAL_ORDER: &str = "ORDER BY modifiedDate DESC, id DESC";

/// Raw `notes` row before normalization
struct NoteRow {
    id: i64,
    title: Option<String>,
    content: Option<String>,
    modified_date: Option<String>,
    is_private: Option<bool>,
}

impl NoteRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            modified_date: row.get(3)?,
            is_private: row.get(4)?,
        })
    }

    fn into_note(self) -> StoreResult<Note> {
        let id = NoteId::new(self.id);
        let raw_date = self.modified_date.ok_or_else(|| StoreError::CorruptRecord {
            id,
            reason: "missing modifiedDate".to_string(),
        })?;
        let modified_date = parse_timestamp(&raw_date).map_err(|e| StoreError::CorruptRecord {
            id,
            reason: format!("bad modifiedDate {:?}: {}", raw_date, e),
        })?;

        Ok(Note {
            id,
            title: self.title.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            modified_date,
            is_private: self.is_private.unwrap_or(false),
        })
    }
}

fn collect_notes(rows: Vec<NoteRow>) -> StoreResult<Vec<Note>> {
    rows.into_iter().map(NoteRow::into_note).collect()
}

impl Database {
    /// All notes, most recently modified first
    pub fn list_notes(&self) -> StoreResult<Vec<Note>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM notes {}", NOTE_COLUMNS, CANONICAL_ORDER))?;
        let rows = stmt
            .query_map([], NoteRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        collect_notes(rows)
    }

    /// Notes of one privacy partition, in canonical order
    pub fn list_notes_in(&self, visibility: Visibility) -> StoreResult<Vec<Note>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes WHERE IFNULL(isPrivate, 0) = ?1 {}",
            NOTE_COLUMNS, CANONICAL_ORDER
        ))?;
        let rows = stmt
            .query_map(params![visibility.is_private()], NoteRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        collect_notes(rows)
    }

    /// Insert a note, applying defaults and stamping `modifiedDate`
    pub fn create_note(&self, new_note: NewNote) -> StoreResult<Note> {
        let title = new_note.title.unwrap_or_default();
        let content = new_note.content.unwrap_or_default();
        let is_private = new_note.is_private.unwrap_or(false);
        let modified_date = fresh_timestamp(None);

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO notes (title, content, modifiedDate, isPrivate) VALUES (?1, ?2, ?3, ?4)",
            params![title, content, format_timestamp(&modified_date), is_private],
        )?;
        let id = NoteId::new(conn.last_insert_rowid());
        log::debug!("[DB] Created note {} (private: {})", id, is_private);

        Ok(Note {
            id,
            title,
            content,
            modified_date,
            is_private,
        })
    }

    /// Point lookup; a missing note is `None`, not an error
    pub fn get_note(&self, id: NoteId) -> StoreResult<Option<Note>> {
        let conn = self.conn.lock();
        fetch_note(&conn, id)
    }

    /// Merge `patch` over the stored note and re-stamp `modifiedDate`.
    ///
    /// Read-then-write under the connection lock only; correct for the
    /// single-writer case, not against other processes writing the file.
    pub fn update_note(&self, id: NoteId, patch: NotePatch) -> StoreResult<Note> {
        let conn = self.conn.lock();
        let mut note = fetch_note(&conn, id)?.ok_or(StoreError::NotFound(id))?;

        patch.apply_to(&mut note);
        note.modified_date = fresh_timestamp(Some(note.modified_date));

        conn.execute(
            "UPDATE notes SET title = ?1, content = ?2, modifiedDate = ?3, isPrivate = ?4 WHERE id = ?5",
            params![
                note.title,
                note.content,
                format_timestamp(&note.modified_date),
                note.is_private,
                id.as_i64(),
            ],
        )?;
        log::debug!("[DB] Updated note {}", id);

        Ok(note)
    }

    /// Remove a note. Deleting a missing id succeeds; the return value
    /// only reports whether a row was removed.
    pub fn delete_note(&self, id: NoteId) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute("DELETE FROM notes WHERE id = ?1", params![id.as_i64()])?;
        if rows_affected == 0 {
            log::debug!("[DB] Delete of missing note {} treated as success", id);
        }
        Ok(rows_affected > 0)
    }

    /// Notes whose title or content contains `query`, ignoring case
    /// ([`Note::matches_query`]), optionally restricted to one partition.
    /// Canonical order; an empty query lists everything.
    pub fn search_notes(&self, query: &str, visibility: Option<Visibility>) -> StoreResult<Vec<Note>> {
        // LIKE only folds ASCII case, so the match runs in Rust
        let notes = match visibility {
            Some(v) => self.list_notes_in(v)?,
            None => self.list_notes()?,
        };
        Ok(notes.into_iter().filter(|n| n.matches_query(query)).collect())
    }
}

fn fetch_note(conn: &Connection, id: NoteId) -> StoreResult<Option<Note>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM notes WHERE id = ?1", NOTE_COLUMNS),
            params![id.as_i64()],
            NoteRow::from_row,
        )
        .optional()?;
    row.map(NoteRow::into_note).transpose()
}

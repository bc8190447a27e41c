//! In-memory mirror of the notes table.
//!
//! List screens read the notes on every render, so the ordered list is held
//! here and all mutations go through the cache. Each mutation writes SQLite
//! first; only when the write succeeds is the cached list patched and the
//! new snapshot published to subscribers. A failed write leaves the cache
//! untouched and publishes nothing.
//!
//! The cached list is kept in canonical order (`modified_date` desc, then
//! id desc). An updated note carries the newest stamp, so it moves to the
//! front immediately rather than waiting for the next reload.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

use super::Database;
use crate::error::StoreResult;
use crate::models::{NewNote, Note, NoteId, NotePatch, Visibility};

/// Snapshot handed to subscribers.
pub type NotesSnapshot = Arc<Vec<Note>>;

/// Store-backed, observable list of notes.
pub struct NotesCache {
    db: Arc<Database>,
    entries: RwLock<Vec<Note>>,
    publisher: watch::Sender<NotesSnapshot>,
}

impl NotesCache {
    /// Populate the cache with one full read of the (already migrated) store.
    pub fn load(db: Arc<Database>) -> StoreResult<Self> {
        let notes = db.list_notes()?;
        log::info!("[NOTES_CACHE] Loaded {} notes", notes.len());

        let (publisher, _) = watch::channel(Arc::new(notes.clone()));
        Ok(Self {
            db,
            entries: RwLock::new(notes),
            publisher,
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Re-read everything from the store and publish the result.
    pub fn reload(&self) -> StoreResult<usize> {
        let notes = self.db.list_notes()?;
        let count = notes.len();
        self.mutate(|entries| *entries = notes);
        log::debug!("[NOTES_CACHE] Reloaded {} notes", count);
        Ok(count)
    }

    /// Subscribe to post-mutation snapshots.
    pub fn subscribe(&self) -> NotesSubscription {
        NotesSubscription {
            receiver: self.publisher.subscribe(),
        }
    }

    /// All cached notes, canonical order.
    pub fn notes(&self) -> Vec<Note> {
        self.entries.read().clone()
    }

    /// One partition, computed on read.
    pub fn notes_in(&self, visibility: Visibility) -> Vec<Note> {
        self.entries
            .read()
            .iter()
            .filter(|n| visibility.admits(n))
            .cloned()
            .collect()
    }

    pub fn public_notes(&self) -> Vec<Note> {
        self.notes_in(Visibility::Public)
    }

    pub fn private_notes(&self) -> Vec<Note> {
        self.notes_in(Visibility::Private)
    }

    /// Cached notes matching `query` (see [`Note::matches_query`]),
    /// optionally restricted to one partition.
    pub fn search(&self, query: &str, visibility: Option<Visibility>) -> Vec<Note> {
        self.entries
            .read()
            .iter()
            .filter(|n| visibility.map_or(true, |v| v.admits(n)))
            .filter(|n| n.matches_query(query))
            .cloned()
            .collect()
    }

    /// Cached copy of one note.
    pub fn get(&self, id: NoteId) -> Option<Note> {
        self.entries.read().iter().find(|n| n.id == id).cloned()
    }

    /// Point lookup against the store (edit screens prefill from here).
    pub fn get_from_store(&self, id: NoteId) -> StoreResult<Option<Note>> {
        self.db.get_note(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Create a note and add it to the cache.
    pub fn create(&self, new_note: NewNote) -> StoreResult<Note> {
        let note = self.db.create_note(new_note)?;
        self.mutate(|entries| insert_ordered(entries, note.clone()));
        Ok(note)
    }

    /// Update a note and move its cached entry to its new position.
    pub fn update(&self, id: NoteId, patch: NotePatch) -> StoreResult<Note> {
        let note = self.db.update_note(id, patch)?;
        self.mutate(|entries| {
            entries.retain(|n| n.id != id);
            insert_ordered(entries, note.clone());
        });
        Ok(note)
    }

    /// Move a note between the public and private partitions.
    pub fn set_private(&self, id: NoteId, is_private: bool) -> StoreResult<Note> {
        self.update(id, NotePatch::privacy(is_private))
    }

    /// Delete a note. Missing ids succeed, as in the store.
    pub fn delete(&self, id: NoteId) -> StoreResult<()> {
        self.db.delete_note(id)?;
        self.mutate(|entries| entries.retain(|n| n.id != id));
        Ok(())
    }

    /// Apply `f` to the cached list under the write lock and publish the result.
    fn mutate<F: FnOnce(&mut Vec<Note>)>(&self, f: F) {
        let mut entries = self.entries.write();
        f(&mut entries);
        self.publisher.send_replace(Arc::new(entries.clone()));
    }
}

/// Insert keeping `modified_date` desc, id desc.
fn insert_ordered(entries: &mut Vec<Note>, note: Note) {
    let key = (note.modified_date, note.id);
    let pos = entries
        .iter()
        .position(|n| (n.modified_date, n.id) < key)
        .unwrap_or(entries.len());
    entries.insert(pos, note);
}

/// Receiving side of the cache's change notifications.
pub struct NotesSubscription {
    receiver: watch::Receiver<NotesSnapshot>,
}

impl NotesSubscription {
    /// Latest published snapshot, without marking it seen.
    pub fn current(&self) -> NotesSnapshot {
        self.receiver.borrow().clone()
    }

    /// Whether a snapshot was published since the last one seen.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Latest snapshot, marking it seen.
    pub fn mark_seen(&mut self) -> NotesSnapshot {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next mutation. `None` once the cache is dropped.
    pub async fn changed(&mut self) -> Option<NotesSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

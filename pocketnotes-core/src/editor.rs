//! Edit session for a single note.
//!
//! An editor is opened either for a brand-new note or for an existing one
//! (prefilled from the store), holds the draft while the user types, and
//! turns a save into a create or an update through the [`NotesCache`].

use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::db::NotesCache;
use crate::error::StoreResult;
use crate::models::{NewNote, Note, NoteId, NotePatch, Visibility};

/// What an edit screen is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    New,
    Existing(NoteId),
}

impl EditTarget {
    /// Parse a route parameter: `"new"` or a note id.
    pub fn from_route(param: &str) -> Option<Self> {
        let param = param.trim();
        if param.eq_ignore_ascii_case("new") {
            return Some(EditTarget::New);
        }
        NoteId::from_str(param).ok().map(EditTarget::Existing)
    }
}

/// Result of [`NoteEditor::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Title and content both empty; nothing was written.
    Discarded,
    /// Another save on this editor has not finished yet.
    AlreadySaving,
    Created(Note),
    Updated(Note),
}

#[derive(Debug, Clone)]
struct Draft {
    target: EditTarget,
    title: String,
    content: String,
}

pub struct NoteEditor<'a> {
    cache: &'a NotesCache,
    visibility: Visibility,
    draft: Mutex<Draft>,
    saving: AtomicBool,
}

/// Holds the in-flight flag; cleared on drop.
pub(crate) struct SaveGuard<'g> {
    flag: &'g AtomicBool,
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<'a> NoteEditor<'a> {
    /// Open an editor. For an existing note the draft is prefilled from the
    /// store; a missing note leaves the draft blank.
    pub fn open(cache: &'a NotesCache, target: EditTarget, visibility: Visibility) -> StoreResult<Self> {
        let (title, content) = match target {
            EditTarget::New => (String::new(), String::new()),
            EditTarget::Existing(id) => match cache.get_from_store(id)? {
                Some(note) => (note.title, note.content),
                None => {
                    log::warn!("[EDITOR] Note {} not found; starting with a blank draft", id);
                    (String::new(), String::new())
                }
            },
        };

        Ok(Self {
            cache,
            visibility,
            draft: Mutex::new(Draft {
                target,
                title,
                content,
            }),
            saving: AtomicBool::new(false),
        })
    }

    pub fn target(&self) -> EditTarget {
        self.draft.lock().target
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn title(&self) -> String {
        self.draft.lock().title.clone()
    }

    pub fn content(&self) -> String {
        self.draft.lock().content.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.draft.lock().title = title.into();
    }

    pub fn set_content(&self, content: impl Into<String>) {
        self.draft.lock().content = content.into();
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    pub(crate) fn begin_save(&self) -> Option<SaveGuard<'_>> {
        self.saving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SaveGuard { flag: &self.saving })
    }

    /// Persist the draft.
    pub fn save(&self) -> StoreResult<SaveOutcome> {
        // Flag before draft: a later save must see the target the previous one left
        let Some(_guard) = self.begin_save() else {
            log::debug!("[EDITOR] Save already in progress");
            return Ok(SaveOutcome::AlreadySaving);
        };

        let draft = self.draft.lock().clone();
        if draft.title.is_empty() && draft.content.is_empty() {
            log::debug!("[EDITOR] Empty draft discarded");
            return Ok(SaveOutcome::Discarded);
        }

        match draft.target {
            EditTarget::New => {
                let note = self.cache.create(NewNote {
                    title: Some(draft.title),
                    content: Some(draft.content),
                    is_private: Some(self.visibility.is_private()),
                })?;
                self.draft.lock().target = EditTarget::Existing(note.id);
                log::info!("[EDITOR] Created {} note {}", self.visibility.as_str(), note.id);
                Ok(SaveOutcome::Created(note))
            }
            EditTarget::Existing(id) => {
                let note = self.cache.update(
                    id,
                    NotePatch {
                        title: Some(draft.title),
                        content: Some(draft.content),
                        is_private: None,
                    },
                )?;
                log::info!("[EDITOR] Updated note {}", note.id);
                Ok(SaveOutcome::Updated(note))
            }
        }
    }
}

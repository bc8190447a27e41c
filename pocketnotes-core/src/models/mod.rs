//! Note data model shared by the store, the cache and the editor.

mod note;

pub use note::{
    fresh_timestamp, format_timestamp, parse_timestamp, NewNote, Note, NoteId, NotePatch,
    Visibility, UNTITLED_NOTE,
};

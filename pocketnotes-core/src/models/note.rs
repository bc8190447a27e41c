use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Title shown for notes saved without one.
pub const UNTITLED_NOTE: &str = "Untitled Note";

/// Store-assigned note identifier.
///
/// Integer-valued in SQLite, surfaced to callers as a string (`"42"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NoteId(i64);

impl NoteId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(NoteId)
    }
}

impl From<NoteId> for String {
    fn from(id: NoteId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for NoteId {
    type Error = ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Privacy partition of the notes table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }

    pub fn from_private_flag(is_private: bool) -> Self {
        if is_private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }

    pub fn is_private(self) -> bool {
        matches!(self, Visibility::Private)
    }

    /// Whether a note belongs to this partition.
    pub fn admits(self, note: &Note) -> bool {
        note.is_private == self.is_private()
    }
}

/// A persisted note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub modified_date: DateTime<Utc>,
    pub is_private: bool,
}

impl Note {
    pub fn visibility(&self) -> Visibility {
        Visibility::from_private_flag(self.is_private)
    }

    /// Title for list rows, falling back to [`UNTITLED_NOTE`].
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            UNTITLED_NOTE
        } else {
            &self.title
        }
    }

    /// Modification date as shown in list rows, e.g. `May 1, 2024`.
    pub fn display_date(&self) -> String {
        self.modified_date.format("%b %-d, %Y").to_string()
    }

    /// Case-insensitive substring match against title or content.
    /// An empty query matches every note.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle) || self.content.to_lowercase().contains(&needle)
    }
}

/// Fields for a new note; absent fields take their defaults
/// (empty title, empty content, public).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_private: Option<bool>,
}

impl NewNote {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn in_partition(mut self, visibility: Visibility) -> Self {
        self.is_private = Some(visibility.is_private());
        self
    }
}

/// Partial update of a note. Provided fields overwrite, absent fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_private: Option<bool>,
}

impl NotePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn privacy(is_private: bool) -> Self {
        Self {
            is_private: Some(is_private),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.is_private.is_none()
    }

    /// Merge this patch over `note`. Does not touch `modified_date`.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(ref title) = self.title {
            note.title = title.clone();
        }
        if let Some(ref content) = self.content {
            note.content = content.clone();
        }
        if let Some(is_private) = self.is_private {
            note.is_private = is_private;
        }
    }
}

/// Current time at the precision the store keeps (milliseconds), never
/// earlier than `floor`.
pub fn fresh_timestamp(floor: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(3);
    match floor {
        Some(previous) if previous > now => previous,
        _ => now,
    }
}

/// Storage form of a timestamp: RFC 3339, milliseconds, `Z` suffix.
/// Fixed width, so lexical order matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

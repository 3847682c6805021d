//! Notes and the on-disk note file format.
//!
//! A project's note file holds notes joined by [`NOTE_SEPARATOR`]. Each note is
//! rendered as a `## <timestamp>[ - <title>]` header, a blank line, and the
//! free-form content. Tasks are never stored separately: they are re-derived
//! from content by [`parser::parse_tasks`].

pub mod parser;
pub mod store;

pub use store::{ProjectTaskStore, TaskSource};

use crate::error::{Error, Result};
use crate::types::{Task, TaskInfo};
use chrono::{Local, NaiveDateTime, Timelike};
use regex_lite::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

/// Token placed between notes in the note file.
pub const NOTE_SEPARATOR: &str = "\n<!-- note -->\n";

/// Timestamp format used in note headers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})(?: - (.*))?$")
        .expect("header pattern is valid")
});

/// One user-authored entry of a note file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub title: String,
    pub content: String,
    pub timestamp: NaiveDateTime,
    /// Derived from `content`. Indices are assigned by the owning store.
    pub tasks: Vec<Task>,
}

impl Note {
    /// Create a note stamped with the current local time.
    pub fn new(title: &str, content: &str) -> Self {
        let now = Local::now().naive_local();
        Self::with_timestamp(title, content, now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn with_timestamp(title: &str, content: &str, timestamp: NaiveDateTime) -> Self {
        let content = content.trim().to_string();
        let tasks = parser::parse_tasks(&content);
        Self {
            title: title.to_string(),
            content,
            timestamp,
            tasks,
        }
    }

    /// Parse one note fragment of the note file.
    pub fn from_text(text: &str) -> Result<Self> {
        let text = text.trim();
        let Some(rest) = text.strip_prefix("## ") else {
            return Err(Error::Parse("fragment does not start with a '## ' header".into()));
        };

        let (header, body) = rest.split_once('\n').unwrap_or((rest, ""));
        let header = header.trim_end();

        let (timestamp, title) = match HEADER.captures(header) {
            Some(caps) => {
                let parsed = caps
                    .get(1)
                    .and_then(|m| NaiveDateTime::parse_from_str(m.as_str(), TIMESTAMP_FORMAT).ok());
                let title = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                (parsed, title)
            }
            None => (None, header),
        };

        let timestamp = timestamp.unwrap_or_else(|| {
            let now = Local::now().naive_local();
            now.with_nanosecond(0).unwrap_or(now)
        });

        Ok(Self::with_timestamp(title, body, timestamp))
    }

    /// Replace title and content and re-derive tasks.
    pub fn update(&mut self, title: &str, content: &str) {
        self.title = title.to_string();
        self.content = content.trim().to_string();
        self.tasks = parser::parse_tasks(&self.content);
    }

    /// Flip the marker of the task at note-local `position`.
    ///
    /// The marker is rewritten in place inside `content`; the rest of the text
    /// is left untouched. Tasks are then re-scanned, since a marker can sit
    /// inside an earlier task's text on the same line, and carry note-local
    /// indices until the owning store restamps them. Returns false when there
    /// is no such task.
    pub(crate) fn set_checked(&mut self, position: usize, checked: bool) -> bool {
        let markers = parser::scan_markers(&self.content);
        let Some(marker) = markers.get(position) else {
            return false;
        };

        let mark = if checked {
            parser::CHECKED_MARK
        } else {
            parser::UNCHECKED_MARK
        };
        self.content.replace_range(marker.start..marker.end, mark);
        self.tasks = parser::parse_tasks(&self.content);
        true
    }

    /// Unchecked tasks with display details.
    pub fn unchecked_tasks(&self) -> Vec<TaskInfo> {
        let timestamp = self.timestamp.format(TIMESTAMP_FORMAT).to_string();
        self.tasks
            .iter()
            .filter(|t| !t.checked)
            .map(|t| TaskInfo {
                index: t.index,
                text: parser::strip_marker(&t.text),
                note_title: self.title.clone(),
                timestamp: timestamp.clone(),
            })
            .collect()
    }

    /// Render the note in note-file form.
    pub fn render(&self) -> String {
        let mut header = self.timestamp.format(TIMESTAMP_FORMAT).to_string();
        if !self.title.is_empty() {
            header.push_str(" - ");
            header.push_str(&self.title);
        }
        format!("## {}\n\n{}\n", header, self.content)
    }
}

/// Split note file content into notes, skipping fragments that fail to parse.
pub fn parse_notes(content: &str) -> Vec<Note> {
    content
        .split(NOTE_SEPARATOR)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .filter_map(|fragment| match Note::from_text(fragment) {
            Ok(note) => Some(note),
            Err(e) => {
                debug!(error = %e, "Skipping note fragment");
                None
            }
        })
        .collect()
}

/// Render notes back into note file content.
pub fn render_notes(notes: &[Note]) -> String {
    notes
        .iter()
        .map(Note::render)
        .collect::<Vec<_>>()
        .join(NOTE_SEPARATOR)
}

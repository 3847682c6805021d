//! Core record types shared by the note stores, the task index and the synchronizer.

use serde::{Deserialize, Serialize};

/// Name of the single note file kept at the root of every project folder.
pub const NOTES_FILE: &str = "notes.md";

/// A checkbox item derived from note content.
///
/// `index` is the scan-order position across all notes of one project. It is
/// recomputed on edits and is not a stable identity across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub index: usize,
    pub checked: bool,
    /// Literal line text from the marker to end of line, e.g. `[ ] write spec`.
    pub text: String,
}

/// Unchecked task with display details, for a project's open-task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub index: usize,
    /// Task text with the checkbox marker removed.
    pub text: String,
    pub note_title: String,
    pub timestamp: String,
}

/// A registered project folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub path: String,
    /// Milliseconds since the Unix epoch of the last successful sync.
    pub last_scan: i64,
    pub active: bool,
}

/// One row of the durable index: a project task as of its last sync.
///
/// `id` is reassigned whenever the owning project is re-synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalTask {
    pub id: i64,
    pub folder_id: i64,
    pub file_path: String,
    /// Scan-order position at last sync, not a file line number.
    pub line_number: i64,
    pub content: String,
    pub completed: bool,
    pub last_updated: i64,
    pub folder_path: String,
}

/// Per-project task counts, computed on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub folder_path: String,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub pending_tasks: i64,
    pub last_updated: Option<i64>,
}

/// The combined cross-project view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalTasks {
    pub tasks: Vec<GlobalTask>,
    pub summaries: Vec<TaskSummary>,
    pub total: usize,
}

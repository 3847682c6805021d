//! Per-project note and task store.
//!
//! One [`ProjectTaskStore`] owns the in-memory notes of one project folder and
//! that folder's note file. Every mutation is applied under the store's write
//! lock and persisted before the lock is released, so readers never observe a
//! half-applied edit.

use super::{Note, parse_notes, render_notes};
use crate::error::{Error, Result};
use crate::types::{NOTES_FILE, Task, TaskInfo};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::debug;

/// What the synchronizer needs from a project's task store.
pub trait TaskSource: Send + Sync {
    /// Project folder this source belongs to.
    fn root(&self) -> &Path;

    /// Re-read the note file, replacing the in-memory state.
    fn load(&self) -> Result<()>;

    /// Snapshot of every task, in note order then scan order.
    fn all_tasks(&self) -> Vec<Task>;

    /// Set the completion state of the task carrying `index`.
    fn update_task(&self, index: usize, checked: bool) -> Result<()>;

    /// True while a mutation has not yet reached the note file.
    fn has_unsaved_changes(&self) -> bool;

    /// Counter bumped by every load and mutation.
    fn revision(&self) -> u64;

    /// True when the note file on disk differs from what was last read or written.
    fn modified_externally(&self) -> bool;
}

/// Size and modification time of the note file as last seen by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn read(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

#[derive(Debug, Default)]
struct StoreState {
    notes: Vec<Note>,
    task_count: usize,
    needs_save: bool,
    revision: u64,
    stamp: Option<FileStamp>,
}

impl StoreState {
    /// Number every task across all notes from 0, in note order.
    fn reassign_all(&mut self) {
        let mut next = 0;
        for note in &mut self.notes {
            for task in &mut note.tasks {
                task.index = next;
                next += 1;
            }
        }
        self.task_count = next;
    }

    /// Renumber the tasks of notes `start..end`, continuing from the tasks of
    /// the notes before `start`.
    ///
    /// Callers pass `end = notes.len()` when a note's task count changed, since
    /// every later index shifts; otherwise only the edited note is restamped.
    fn reassign_range(&mut self, start: usize, end: usize) {
        let mut next: usize = self.notes[..start].iter().map(|n| n.tasks.len()).sum();
        for note in &mut self.notes[start..end] {
            for task in &mut note.tasks {
                task.index = next;
                next += 1;
            }
        }
        if end == self.notes.len() {
            self.task_count = next;
        }
    }

    /// Locate a task by its global index: (note position, note-local position).
    fn locate(&self, index: usize) -> Option<(usize, usize)> {
        self.notes.iter().enumerate().find_map(|(ni, note)| {
            note.tasks
                .iter()
                .position(|t| t.index == index)
                .map(|ti| (ni, ti))
        })
    }
}

/// In-memory notes of one project, persisted to `<root>/notes.md`.
#[derive(Debug)]
pub struct ProjectTaskStore {
    root: PathBuf,
    notes_path: PathBuf,
    state: RwLock<StoreState>,
}

impl ProjectTaskStore {
    /// Open the store for a project folder and load its note file.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let store = Self {
            notes_path: root.join(NOTES_FILE),
            root,
            state: RwLock::new(StoreState::default()),
        };
        store.load()?;
        Ok(store)
    }

    pub fn notes_path(&self) -> &Path {
        &self.notes_path
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the note file, creating an empty one when absent.
    fn read_notes_file(&self) -> Result<Vec<Note>> {
        if !self.notes_path.exists() {
            fs::write(&self.notes_path, "").map_err(|e| Error::io(&self.notes_path, e))?;
            return Ok(Vec::new());
        }

        let bytes = fs::read(&self.notes_path).map_err(|e| Error::io(&self.notes_path, e))?;
        let content = String::from_utf8(bytes).map_err(|_| Error::Decode {
            path: self.notes_path.clone(),
        })?;

        Ok(parse_notes(&content))
    }

    /// Write every note back to the note file atomically.
    fn persist(&self, state: &mut StoreState) -> Result<()> {
        if !state.needs_save {
            return Ok(());
        }

        let content = render_notes(&state.notes);
        let dir = self.notes_path.parent().unwrap_or(Path::new("."));
        let write = || -> std::io::Result<()> {
            let mut tmp = NamedTempFile::new_in(dir)?;
            tmp.write_all(content.as_bytes())?;
            tmp.flush()?;
            tmp.persist(&self.notes_path).map_err(|e| e.error)?;
            Ok(())
        };
        write().map_err(|e| Error::io(&self.notes_path, e))?;

        state.needs_save = false;
        state.stamp = FileStamp::read(&self.notes_path);
        debug!(path = %self.notes_path.display(), notes = state.notes.len(), "Saved notes");
        Ok(())
    }

    /// Record a mutation and persist it.
    fn commit(&self, state: &mut StoreState) -> Result<()> {
        state.needs_save = true;
        state.revision += 1;
        self.persist(state)
    }

    /// Insert a note at the front of the collection.
    pub fn add_note(&self, title: &str, content: &str) -> Result<()> {
        let mut state = self.write();
        let note = Note::new(title, content);
        let has_tasks = !note.tasks.is_empty();
        state.notes.insert(0, note);
        if has_tasks {
            let len = state.notes.len();
            state.reassign_range(0, len);
        }
        self.commit(&mut state)
    }

    /// Replace the title and content of the note at `index`.
    pub fn update_note(&self, index: usize, title: &str, content: &str) -> Result<()> {
        let mut state = self.write();
        let len = state.notes.len();
        let Some(note) = state.notes.get_mut(index) else {
            return Err(Error::note_out_of_range(index, len));
        };

        let old_count = note.tasks.len();
        note.update(title, content);
        let count_changed = note.tasks.len() != old_count;

        if count_changed {
            state.reassign_range(index, len);
        } else {
            state.reassign_range(index, index + 1);
        }
        self.commit(&mut state)
    }

    /// Remove the note at `index`.
    pub fn delete_note(&self, index: usize) -> Result<()> {
        let mut state = self.write();
        let len = state.notes.len();
        if index >= len {
            return Err(Error::note_out_of_range(index, len));
        }

        state.notes.remove(index);
        // Full recount rather than an offset from the removed note.
        state.reassign_all();
        self.commit(&mut state)
    }

    /// Copy of the note at `index`.
    pub fn note(&self, index: usize) -> Result<Note> {
        let state = self.read();
        state
            .notes
            .get(index)
            .cloned()
            .ok_or_else(|| Error::note_out_of_range(index, state.notes.len()))
    }

    /// Copy of every note, newest first.
    pub fn notes(&self) -> Vec<Note> {
        self.read().notes.clone()
    }

    /// Number of notes.
    pub fn len(&self) -> usize {
        self.read().notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tasks across all notes.
    pub fn task_count(&self) -> usize {
        self.read().task_count
    }

    /// Unchecked tasks across all notes.
    pub fn active_tasks(&self) -> Vec<TaskInfo> {
        self.read()
            .notes
            .iter()
            .flat_map(Note::unchecked_tasks)
            .collect()
    }
}

impl TaskSource for ProjectTaskStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn load(&self) -> Result<()> {
        let mut state = self.write();
        state.notes = self.read_notes_file()?;
        state.reassign_all();
        state.needs_save = false;
        state.revision += 1;
        state.stamp = FileStamp::read(&self.notes_path);
        debug!(
            path = %self.notes_path.display(),
            notes = state.notes.len(),
            tasks = state.task_count,
            "Loaded notes"
        );
        Ok(())
    }

    fn all_tasks(&self) -> Vec<Task> {
        self.read()
            .notes
            .iter()
            .flat_map(|note| note.tasks.iter().cloned())
            .collect()
    }

    fn update_task(&self, index: usize, checked: bool) -> Result<()> {
        let mut state = self.write();
        let Some((ni, ti)) = state.locate(index) else {
            return Err(Error::task_not_found(index));
        };

        if state.notes[ni].tasks[ti].checked == checked {
            return Ok(());
        }

        if !state.notes[ni].set_checked(ti, checked) {
            return Err(Error::task_not_found(index));
        }
        // The note's tasks were re-scanned with note-local indices.
        state.reassign_range(ni, ni + 1);
        self.commit(&mut state)
    }

    fn has_unsaved_changes(&self) -> bool {
        self.read().needs_save
    }

    fn revision(&self) -> u64 {
        self.read().revision
    }

    fn modified_externally(&self) -> bool {
        let state = self.read();
        FileStamp::read(&self.notes_path) != state.stamp
    }
}

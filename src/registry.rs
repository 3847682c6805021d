//! Attached project stores and project validity checks.
//!
//! The registry maps a project's normalized path to the store handle the
//! synchronizer pulls from. Only the synchronizer attaches or detaches
//! entries. Lookups clone the handle out and release the map lock before any
//! store I/O happens.

use crate::error::{Error, Result};
use crate::notes::TaskSource;
use crate::types::NOTES_FILE;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

struct Attached {
    source: Arc<dyn TaskSource>,
    /// Store revision last written to the index, if any.
    synced_revision: Option<u64>,
}

/// Map from project path to its attached task store.
#[derive(Default)]
pub struct ProjectRegistry {
    entries: RwLock<HashMap<PathBuf, Attached>>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a store, replacing any store previously attached at `path`.
    pub(crate) fn attach(&self, path: PathBuf, source: Arc<dyn TaskSource>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            path,
            Attached {
                source,
                synced_revision: None,
            },
        );
    }

    /// Detach the store at `path`. Returns whether one was attached.
    pub(crate) fn detach(&self, path: &Path) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(path).is_some()
    }

    /// The store attached at `path`.
    pub fn get(&self, path: &Path) -> Option<Arc<dyn TaskSource>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(path).map(|a| Arc::clone(&a.source))
    }

    pub fn is_attached(&self, path: &Path) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(path)
    }

    /// Every attached path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut paths: Vec<_> = entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn synced_revision(&self, path: &Path) -> Option<u64> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(path).and_then(|a| a.synced_revision)
    }

    /// Record that `revision` of the store at `path` reached the index.
    pub(crate) fn mark_synced(&self, path: &Path, revision: u64) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(attached) = entries.get_mut(path) {
            attached.synced_revision = Some(revision);
        }
    }
}

/// Check that a project folder and its note file both still exist.
pub fn validate(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(Error::Validation {
            path: path.to_path_buf(),
            reason: "directory does not exist".into(),
        });
    }
    if !path.join(NOTES_FILE).is_file() {
        return Err(Error::Validation {
            path: path.to_path_buf(),
            reason: format!("{NOTES_FILE} does not exist"),
        });
    }
    Ok(())
}

/// Canonical form of a project path, or the path as given when it can't be resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

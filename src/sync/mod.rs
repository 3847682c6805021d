//! Reconciliation between project task stores and the task index.
//!
//! The [`Synchronizer`] owns the index and the registry of attached stores.
//! A pass walks every active project: projects that no longer validate are
//! staged and removed once the walk is done, and every other attached project
//! is re-pulled (forced passes) or re-pulled when due (scheduled passes).
//!
//! Lock order is fixed everywhere: a store's lock is taken and released before
//! the index transaction that uses its data, never held across it.

pub mod scheduler;

use crate::db::{Database, now_ms};
use crate::error::{Error, Result};
use crate::notes::TaskSource;
use crate::registry::{self, ProjectRegistry};
use crate::types::{GlobalTasks, Project};
use scheduler::SchedulerHandle;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default interval between scheduled passes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// How much older than one interval a project's last sync may get before a
/// scheduled pass re-pulls it regardless of changes.
pub const STALE_GRACE: Duration = Duration::from_secs(5);

/// Timing of scheduled passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub interval: Duration,
    pub stale_after: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::with_interval(DEFAULT_INTERVAL)
    }
}

impl SyncSettings {
    /// Settings for `interval`, with the staleness threshold one grace period longer.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            stale_after: interval + STALE_GRACE,
        }
    }
}

/// Which gate a pass applies before re-pulling a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Re-pull only projects with changes or an aged last sync.
    Scheduled,
    /// Re-pull every attached project.
    Forced,
}

/// Outcome of one pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub synced: Vec<PathBuf>,
    /// Not due, or no store attached in this process.
    pub skipped: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What happened to the owning store after a completion change in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum Propagation {
    /// The matching task in the note file was updated.
    Applied,
    /// No task in the store carries the indexed text any more.
    NoMatch,
    /// The owning project has no attached store or no longer validates.
    NotAttached,
    /// A match was found but the store could not be updated.
    StoreFailed(String),
}

/// Drives reconciliation between attached stores and the task index.
pub struct Synchronizer {
    db: Database,
    registry: ProjectRegistry,
    settings: SyncSettings,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl Synchronizer {
    pub fn new(db: Database, settings: SyncSettings) -> Self {
        Self {
            db,
            registry: ProjectRegistry::new(),
            settings,
            scheduler: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Record a project in the index, attach its store, and pull its tasks.
    ///
    /// Only index failures while recording the project are returned. A failed
    /// initial pull is logged and retried by the next pass.
    pub fn register_project(&self, path: &Path, source: Arc<dyn TaskSource>) -> Result<Project> {
        let path = registry::normalize_path(path);
        let project = self.db.register_project(&path.to_string_lossy())?;

        self.registry.attach(path.clone(), Arc::clone(&source));
        info!(project = %path.display(), id = project.id, "Registered project");

        if let Err(e) = self.pull(project.id, &path, source.as_ref()) {
            warn!(project = %path.display(), error = %e, "Initial sync failed");
        }

        Ok(project)
    }

    /// Replace the index rows of one project with the store's current tasks.
    fn pull(&self, project_id: i64, path: &Path, source: &dyn TaskSource) -> Result<usize> {
        if source.modified_externally() {
            debug!(project = %path.display(), "Note file changed on disk, reloading");
            source.load()?;
        }

        let revision = source.revision();
        let tasks = source.all_tasks();
        let written = self.db.replace_project_tasks(project_id, &tasks)?;
        self.registry.mark_synced(path, revision);

        debug!(project = %path.display(), tasks = written, revision, "Synced project");
        Ok(written)
    }

    /// Whether a scheduled pass should re-pull this project.
    fn is_due(&self, project: &Project, path: &Path, source: &dyn TaskSource, now: i64) -> bool {
        if source.has_unsaved_changes() || source.modified_externally() {
            return true;
        }
        if self.registry.synced_revision(path) != Some(source.revision()) {
            return true;
        }
        let stale_ms = i64::try_from(self.settings.stale_after.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(project.last_scan) > stale_ms
    }

    /// Run one pass over every active project.
    ///
    /// Per-project failures are recorded in the report and never stop the
    /// pass. The only error returned is failing to list the active projects.
    pub fn run_pass(&self, mode: PassMode) -> Result<SyncReport> {
        let projects = self.db.list_active_projects()?;
        let now = now_ms();
        let mut report = SyncReport::default();
        let mut staged = Vec::new();

        for project in projects {
            let path = PathBuf::from(&project.path);

            if let Err(e) = registry::validate(&path) {
                info!(project = %path.display(), reason = %e, "Staging project for removal");
                staged.push((project.id, path));
                continue;
            }

            let Some(source) = self.registry.get(&path) else {
                report.skipped.push(path);
                continue;
            };

            if mode == PassMode::Scheduled && !self.is_due(&project, &path, source.as_ref(), now) {
                report.skipped.push(path);
                continue;
            }

            match self.pull(project.id, &path, source.as_ref()) {
                Ok(_) => report.synced.push(path),
                Err(e) => {
                    warn!(project = %path.display(), error = %e, "Project sync failed");
                    report.failures.push((path, e.to_string()));
                }
            }
        }

        for (id, path) in staged {
            match self.db.remove_project(id) {
                Ok(()) => {
                    info!(project = %path.display(), "Removed stale project");
                    self.registry.detach(&path);
                    report.removed.push(path);
                }
                // Already removed by a concurrent pass.
                Err(Error::NotFound { .. }) => {
                    self.registry.detach(&path);
                }
                Err(e) => {
                    warn!(project = %path.display(), error = %e, "Failed to remove stale project");
                    report.failures.push((path, e.to_string()));
                }
            }
        }

        debug!(
            mode = ?mode,
            synced = report.synced.len(),
            skipped = report.skipped.len(),
            removed = report.removed.len(),
            failed = report.failures.len(),
            "Sync pass complete"
        );
        Ok(report)
    }

    /// Re-pull every attached project now.
    pub fn force_sync(&self) -> Result<SyncReport> {
        self.run_pass(PassMode::Forced)
    }

    /// The combined view across every active project.
    pub fn global_tasks(&self) -> Result<GlobalTasks> {
        self.db.list_global_tasks()
    }

    pub fn list_active_projects(&self) -> Result<Vec<Project>> {
        self.db.list_active_projects()
    }

    /// Set the completion of a global task, then carry it into the owning note file.
    ///
    /// The index is updated first and stays updated whatever happens to the
    /// store. The store task is found by exact literal text; the first match
    /// wins.
    pub fn set_global_task_completion(&self, id: i64, completed: bool) -> Result<Propagation> {
        let task = self
            .db
            .get_global_task(id)?
            .ok_or_else(|| Error::global_task_not_found(id))?;
        self.db.set_task_completion(id, completed)?;

        let path = PathBuf::from(&task.folder_path);
        if registry::validate(&path).is_err() {
            return Ok(Propagation::NotAttached);
        }
        let Some(source) = self.registry.get(&path) else {
            debug!(project = %path.display(), id, "No store attached, index updated only");
            return Ok(Propagation::NotAttached);
        };

        if source.modified_externally() {
            if let Err(e) = source.load() {
                warn!(project = %path.display(), error = %e, "Reload before propagation failed");
                return Ok(Propagation::StoreFailed(e.to_string()));
            }
        }

        let Some(local) = source
            .all_tasks()
            .into_iter()
            .find(|t| t.text == task.content)
        else {
            debug!(project = %path.display(), id, text = %task.content, "No matching task in store");
            return Ok(Propagation::NoMatch);
        };

        match source.update_task(local.index, completed) {
            Ok(()) => Ok(Propagation::Applied),
            Err(e) => {
                warn!(project = %path.display(), index = local.index, error = %e, "Failed to propagate completion");
                Ok(Propagation::StoreFailed(e.to_string()))
            }
        }
    }

    /// Attach stores for active index projects that validate but are not attached.
    ///
    /// The index rows are left as they are, so global task ids stay valid
    /// until the next pass re-pulls the project. Returns how many were
    /// attached. Projects whose store fails to open are logged and skipped.
    pub fn attach_known_projects<F>(&self, opener: F) -> Result<usize>
    where
        F: Fn(&Path) -> Result<Arc<dyn TaskSource>>,
    {
        let mut attached = 0;
        for project in self.db.list_active_projects()? {
            let path = PathBuf::from(&project.path);
            if self.registry.is_attached(&path) || registry::validate(&path).is_err() {
                continue;
            }

            match opener(&path) {
                Ok(source) => {
                    self.registry.attach(path.clone(), source);
                    debug!(project = %path.display(), id = project.id, "Attached known project");
                    attached += 1;
                }
                Err(e) => warn!(project = %path.display(), error = %e, "Could not attach known project"),
            }
        }
        Ok(attached)
    }

    /// Start the scheduled pass. Must be called inside a tokio runtime.
    ///
    /// Does nothing when already running. A zero interval is rejected.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let interval = self.settings.interval;
        if interval.is_zero() {
            return Err(Error::Config("sync interval must be greater than zero".into()));
        }

        let mut guard = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Ok(());
        }
        *guard = Some(scheduler::spawn(Arc::downgrade(self), interval));
        info!(interval = ?interval, "Sync scheduler started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop the scheduled pass, letting an in-flight pass finish, then close the index.
    pub async fn shutdown(&self) -> Result<()> {
        let handle = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        self.db.close()?;
        info!("Synchronizer shut down");
        Ok(())
    }
}

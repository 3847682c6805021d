//! Integration tests for the synchronizer: registration, passes, stale
//! project removal, and reverse propagation.

use crossnote::db::Database;
use crossnote::error::{Error, Result};
use crossnote::notes::{ProjectTaskStore, TaskSource};
use crossnote::sync::{PassMode, Propagation, SyncSettings, Synchronizer};
use crossnote::types::{NOTES_FILE, Task};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DEMO: &str = "## 2025-01-07 10:00:00 - Demo\n\n- [ ] write spec\n- [x] draft outline\n";

fn setup_sync() -> Synchronizer {
    setup_sync_with(SyncSettings::default())
}

fn setup_sync_with(settings: SyncSettings) -> Synchronizer {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    Synchronizer::new(db, settings)
}

fn project(content: &str) -> (TempDir, Arc<ProjectTaskStore>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join(NOTES_FILE), content).unwrap();
    let store = Arc::new(ProjectTaskStore::open(dir.path()).unwrap());
    (dir, store)
}

fn open_store(path: &Path) -> Result<Arc<dyn TaskSource>> {
    Ok(Arc::new(ProjectTaskStore::open(path)?))
}

fn canonical(dir: &TempDir) -> PathBuf {
    dir.path().canonicalize().unwrap()
}

fn global_id(sync: &Synchronizer, content: &str) -> i64 {
    sync.global_tasks()
        .unwrap()
        .tasks
        .into_iter()
        .find(|t| t.content == content)
        .map(|t| t.id)
        .expect("task should be in the index")
}

/// A source whose reloads always fail.
struct BrokenSource {
    root: PathBuf,
}

impl TaskSource for BrokenSource {
    fn root(&self) -> &Path {
        &self.root
    }
    fn load(&self) -> Result<()> {
        Err(Error::Parse("unreadable".into()))
    }
    fn all_tasks(&self) -> Vec<Task> {
        Vec::new()
    }
    fn update_task(&self, index: usize, _checked: bool) -> Result<()> {
        Err(Error::task_not_found(index))
    }
    fn has_unsaved_changes(&self) -> bool {
        false
    }
    fn revision(&self) -> u64 {
        0
    }
    fn modified_externally(&self) -> bool {
        true
    }
}

mod registration_tests {
    use super::*;

    #[test]
    fn register_pulls_initial_tasks() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);

        let registered = sync.register_project(dir.path(), store).unwrap();

        assert_eq!(PathBuf::from(&registered.path), canonical(&dir));
        assert!(sync.registry().is_attached(&canonical(&dir)));

        let view = sync.global_tasks().unwrap();
        assert_eq!(view.total, 2);
        assert_eq!(view.summaries[0].pending_tasks, 1);
        assert_eq!(view.summaries[0].completed_tasks, 1);
    }

    #[test]
    fn register_twice_keeps_one_project() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);

        let first = sync.register_project(dir.path(), store.clone()).unwrap();
        let again = sync.register_project(dir.path(), store).unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(sync.list_active_projects().unwrap().len(), 1);
        assert_eq!(sync.global_tasks().unwrap().total, 2);
    }

    #[test]
    fn failed_initial_pull_still_registers() {
        let sync = setup_sync();
        let (dir, _store) = project(DEMO);
        let broken = Arc::new(BrokenSource {
            root: dir.path().to_path_buf(),
        });

        sync.register_project(dir.path(), broken).unwrap();

        assert_eq!(sync.list_active_projects().unwrap().len(), 1);
        assert_eq!(sync.global_tasks().unwrap().total, 0);
    }

    #[test]
    fn registration_fails_when_index_closed() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);
        sync.database().close().unwrap();

        let err = sync.register_project(dir.path(), store).unwrap_err();
        assert!(matches!(err, Error::Closed));
        assert!(!sync.registry().is_attached(&canonical(&dir)));
    }

    #[test]
    fn known_projects_reattach_from_shared_index() {
        let db = Database::open_in_memory().unwrap();
        let first = Synchronizer::new(db.clone(), SyncSettings::default());
        let (dir, store) = project(DEMO);
        first.register_project(dir.path(), store).unwrap();
        let id = global_id(&first, "[ ] write spec");

        let second = Synchronizer::new(db, SyncSettings::default());
        assert_eq!(second.attach_known_projects(open_store).unwrap(), 1);
        assert!(second.registry().is_attached(&canonical(&dir)));
        assert_eq!(second.attach_known_projects(open_store).unwrap(), 0);

        // Attaching leaves the index rows alone.
        assert_eq!(global_id(&second, "[ ] write spec"), id);
        assert_eq!(second.registry().synced_revision(&canonical(&dir)), None);
    }
}

mod pass_tests {
    use super::*;

    #[test]
    fn deleted_folder_is_removed_on_next_tick() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);
        let path = canonical(&dir);
        let registered = sync.register_project(dir.path(), store).unwrap();
        assert_eq!(sync.global_tasks().unwrap().total, 2);

        fs::remove_dir_all(dir.path()).unwrap();
        let report = sync.run_pass(PassMode::Scheduled).unwrap();

        assert_eq!(report.removed, vec![path.clone()]);
        assert!(sync.list_active_projects().unwrap().is_empty());
        assert_eq!(sync.global_tasks().unwrap().total, 0);
        assert!(sync.database().get_project(registered.id).unwrap().is_none());
        let rows: i64 = sync
            .database()
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM tasks WHERE folder_id = ?1",
                    [registered.id],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(rows, 0);
        assert!(!sync.registry().is_attached(&path));
    }

    #[test]
    fn missing_note_file_is_removed() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);
        sync.register_project(dir.path(), store).unwrap();

        fs::remove_file(dir.path().join(NOTES_FILE)).unwrap();
        let report = sync.force_sync().unwrap();

        assert_eq!(report.removed.len(), 1);
        assert!(sync.list_active_projects().unwrap().is_empty());
        // The store never recreates a file for a removed project.
        assert!(!dir.path().join(NOTES_FILE).exists());
    }

    #[test]
    fn scheduled_pass_skips_unchanged_projects() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);
        sync.register_project(dir.path(), store.clone()).unwrap();

        let report = sync.run_pass(PassMode::Scheduled).unwrap();
        assert!(report.synced.is_empty());
        assert_eq!(report.skipped, vec![canonical(&dir)]);

        store.add_note("More", "- [ ] third").unwrap();
        let report = sync.run_pass(PassMode::Scheduled).unwrap();
        assert_eq!(report.synced, vec![canonical(&dir)]);
        assert_eq!(sync.global_tasks().unwrap().total, 3);

        let report = sync.run_pass(PassMode::Scheduled).unwrap();
        assert!(report.synced.is_empty());
    }

    #[test]
    fn scheduled_pass_repulls_stale_projects() {
        let sync = setup_sync_with(SyncSettings {
            interval: Duration::from_secs(1),
            stale_after: Duration::ZERO,
        });
        let (dir, store) = project(DEMO);
        sync.register_project(dir.path(), store).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        let report = sync.run_pass(PassMode::Scheduled).unwrap();
        assert_eq!(report.synced, vec![canonical(&dir)]);
    }

    #[test]
    fn forced_pass_always_repulls() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);
        sync.register_project(dir.path(), store).unwrap();
        let before = global_id(&sync, "[ ] write spec");

        let report = sync.force_sync().unwrap();
        assert_eq!(report.synced, vec![canonical(&dir)]);
        assert!(report.is_clean());
        // Full replace issues fresh ids.
        assert_ne!(global_id(&sync, "[ ] write spec"), before);
    }

    #[test]
    fn external_edit_reaches_the_index() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);
        sync.register_project(dir.path(), store.clone()).unwrap();

        fs::write(
            dir.path().join(NOTES_FILE),
            "## 2025-01-09 08:00:00 - Edited\n\n- [ ] edited outside\n",
        )
        .unwrap();
        let report = sync.run_pass(PassMode::Scheduled).unwrap();

        assert_eq!(report.synced.len(), 1);
        let view = sync.global_tasks().unwrap();
        assert_eq!(view.total, 1);
        assert_eq!(view.tasks[0].content, "[ ] edited outside");
        assert_eq!(store.all_tasks().len(), 1);
    }

    #[test]
    fn one_failing_project_does_not_stop_the_pass() {
        let sync = setup_sync();
        let (good_dir, good) = project(DEMO);
        let (bad_dir, _bad) = project(DEMO);
        sync.register_project(good_dir.path(), good).unwrap();
        sync.register_project(
            bad_dir.path(),
            Arc::new(BrokenSource {
                root: bad_dir.path().to_path_buf(),
            }),
        )
        .unwrap();

        let report = sync.force_sync().unwrap();

        assert_eq!(report.synced, vec![canonical(&good_dir)]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, canonical(&bad_dir));
        assert!(!report.is_clean());
        assert_eq!(sync.list_active_projects().unwrap().len(), 2);
    }

    #[test]
    fn unattached_projects_are_skipped() {
        let sync = setup_sync();
        let (dir, _store) = project(DEMO);
        let path = canonical(&dir);
        sync.database()
            .register_project(&path.to_string_lossy())
            .unwrap();

        let report = sync.force_sync().unwrap();
        assert_eq!(report.skipped, vec![path]);
        assert!(report.synced.is_empty());
    }

    #[test]
    fn pass_fails_only_when_projects_cannot_be_listed() {
        let sync = setup_sync();
        sync.database().close().unwrap();
        assert!(matches!(sync.force_sync(), Err(Error::Closed)));
    }
}

mod propagation_tests {
    use super::*;

    #[test]
    fn global_toggle_reaches_note_file() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);
        sync.register_project(dir.path(), store.clone()).unwrap();
        let id = global_id(&sync, "[ ] write spec");

        let outcome = sync.set_global_task_completion(id, true).unwrap();

        assert_eq!(outcome, Propagation::Applied);
        assert!(sync.database().get_global_task(id).unwrap().unwrap().completed);
        assert!(store.all_tasks()[0].checked);
        let file = fs::read_to_string(dir.path().join(NOTES_FILE)).unwrap();
        assert!(file.contains("- [x] write spec\n- [x] draft outline"));
    }

    #[test]
    fn listed_id_toggles_from_a_second_synchronizer() {
        let index_dir = TempDir::new().unwrap();
        let db_path = index_dir.path().join("index.db");
        let (dir, store) = project(DEMO);

        // One run registers and lists the combined view.
        let first = Synchronizer::new(Database::open(&db_path).unwrap(), SyncSettings::default());
        first.register_project(dir.path(), store).unwrap();
        first.force_sync().unwrap();
        let id = global_id(&first, "[ ] write spec");
        first.database().close().unwrap();

        // A later run toggles the id it printed.
        let second = Synchronizer::new(Database::open(&db_path).unwrap(), SyncSettings::default());
        second.attach_known_projects(open_store).unwrap();
        let outcome = second.set_global_task_completion(id, true).unwrap();

        assert_eq!(outcome, Propagation::Applied);
        let file = fs::read_to_string(dir.path().join(NOTES_FILE)).unwrap();
        assert!(file.contains("- [x] write spec"));

        second.force_sync().unwrap();
        let view = second.global_tasks().unwrap();
        assert!(view.tasks.iter().all(|t| t.completed));
    }

    #[test]
    fn duplicate_text_toggles_first_match() {
        let sync = setup_sync();
        let (dir, store) = project("## 2025-01-07 10:00:00 - Dupes\n\n- [ ] same\n- [ ] same\n");
        sync.register_project(dir.path(), store.clone()).unwrap();

        let second_row = sync
            .global_tasks()
            .unwrap()
            .tasks
            .into_iter()
            .find(|t| t.line_number == 1)
            .expect("second task should be in the index");

        let outcome = sync.set_global_task_completion(second_row.id, true).unwrap();

        assert_eq!(outcome, Propagation::Applied);
        let file = fs::read_to_string(dir.path().join(NOTES_FILE)).unwrap();
        assert!(file.contains("- [x] same\n- [ ] same"));
        assert!(store.all_tasks()[0].checked);
        assert!(!store.all_tasks()[1].checked);
    }

    #[test]
    fn changed_text_leaves_note_file_alone() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);
        sync.register_project(dir.path(), store.clone()).unwrap();
        let id = global_id(&sync, "[ ] write spec");

        store
            .update_note(0, "Demo", "- [ ] write the spec\n- [x] draft outline")
            .unwrap();
        let before = fs::read_to_string(dir.path().join(NOTES_FILE)).unwrap();

        let outcome = sync.set_global_task_completion(id, true).unwrap();

        assert_eq!(outcome, Propagation::NoMatch);
        assert!(sync.database().get_global_task(id).unwrap().unwrap().completed);
        let after = fs::read_to_string(dir.path().join(NOTES_FILE)).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn toggle_without_attached_store_updates_index_only() {
        let sync = setup_sync();
        let (dir, _store) = project(DEMO);
        let path = canonical(&dir);
        let registered = sync
            .database()
            .register_project(&path.to_string_lossy())
            .unwrap();
        sync.database()
            .replace_project_tasks(
                registered.id,
                &[Task {
                    index: 0,
                    checked: false,
                    text: "[ ] write spec".into(),
                }],
            )
            .unwrap();
        let id = global_id(&sync, "[ ] write spec");

        let outcome = sync.set_global_task_completion(id, true).unwrap();

        assert_eq!(outcome, Propagation::NotAttached);
        assert!(sync.database().get_global_task(id).unwrap().unwrap().completed);
        assert_eq!(fs::read_to_string(dir.path().join(NOTES_FILE)).unwrap(), DEMO);
    }

    #[test]
    fn toggle_reloads_externally_edited_store_first() {
        let sync = setup_sync();
        let (dir, store) = project(DEMO);
        sync.register_project(dir.path(), store.clone()).unwrap();
        let id = global_id(&sync, "[ ] write spec");

        let edited = "## 2025-01-07 10:00:00 - Demo\n\n- [ ] write spec\n- [x] draft outline\n- [ ] added by hand\n";
        fs::write(dir.path().join(NOTES_FILE), edited).unwrap();

        let outcome = sync.set_global_task_completion(id, true).unwrap();

        assert_eq!(outcome, Propagation::Applied);
        let file = fs::read_to_string(dir.path().join(NOTES_FILE)).unwrap();
        assert!(file.contains("- [x] write spec"));
        assert!(file.contains("- [ ] added by hand"));
    }

    #[test]
    fn unknown_global_id() {
        let sync = setup_sync();
        let err = sync.set_global_task_completion(99, true).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}

mod scheduler_tests {
    use super::*;

    #[tokio::test]
    async fn scheduler_picks_up_local_edits_and_stops() {
        let sync = Arc::new(setup_sync_with(SyncSettings::with_interval(
            Duration::from_millis(50),
        )));
        let (dir, store) = project(DEMO);
        sync.register_project(dir.path(), store.clone()).unwrap();

        sync.start().unwrap();
        assert!(sync.is_running());
        // Starting again is a no-op.
        sync.start().unwrap();

        store.add_note("Later", "- [ ] picked up by the tick").unwrap();

        let mut seen = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            if sync.global_tasks().unwrap().total == 3 {
                seen = true;
                break;
            }
        }
        assert!(seen, "scheduled pass should have re-pulled the project");

        sync.shutdown().await.unwrap();
        assert!(!sync.is_running());
        assert!(sync.database().is_closed());
        assert!(matches!(sync.global_tasks(), Err(Error::Closed)));
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let sync = Arc::new(setup_sync_with(SyncSettings::with_interval(Duration::ZERO)));

        let err = sync.start().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!sync.is_running());
    }

    #[tokio::test]
    async fn shutdown_without_start_closes_index() {
        let sync = setup_sync();
        sync.shutdown().await.unwrap();
        assert!(sync.database().is_closed());
    }
}

//! crossnote
//!
//! Keeps checklists in each project's notes.md and mirrors them into one
//! task index for a combined view across projects.

use anyhow::{Context, Result};
use clap::Parser;
use crossnote::cli::{Cli, Command, NoteCommand};
use crossnote::config::{Config, ConfigLoader};
use crossnote::db::Database;
use crossnote::format::{self, OutputFormat};
use crossnote::logging::{self, LogTarget};
use crossnote::notes::{ProjectTaskStore, TaskSource};
use crossnote::sync::Synchronizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

fn open_store(path: &Path) -> crossnote::error::Result<Arc<dyn TaskSource>> {
    Ok(Arc::new(ProjectTaskStore::open(path)?))
}

fn open_synchronizer(config: &Config) -> Result<Arc<Synchronizer>> {
    let settings = config.sync.settings()?;
    let db_path = &config.index.db_path;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db = Database::open(db_path)
        .with_context(|| format!("Failed to open task index {}", db_path.display()))?;
    debug!(path = %db_path.display(), "Opened task index");
    Ok(Arc::new(Synchronizer::new(db, settings)))
}

fn register_dirs(sync: &Synchronizer, dirs: &[PathBuf]) -> Result<()> {
    for dir in dirs {
        let store = open_store(dir)
            .with_context(|| format!("Failed to open notes in {}", dir.display()))?;
        sync.register_project(dir, store)?;
    }
    Ok(())
}

/// Run index and note file work off the async runtime, as scheduled passes do.
async fn blocking<T, F>(sync: &Arc<Synchronizer>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Synchronizer) -> crossnote::error::Result<T> + Send + 'static,
{
    let sync = Arc::clone(sync);
    let value = tokio::task::spawn_blocking(move || work(&sync))
        .await
        .context("Blocking sync work panicked")??;
    Ok(value)
}

fn print<T, F>(format: OutputFormat, value: &T, markdown: F) -> Result<()>
where
    T: serde::Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    println!("{}", format::render(format, value, markdown)?);
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let project = match cli.project {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let with_default = |dirs: Vec<PathBuf>| {
        if dirs.is_empty() {
            vec![project.clone()]
        } else {
            dirs
        }
    };

    let sync = open_synchronizer(&config)?;

    match cli.command {
        Command::Serve { dirs } => {
            register_dirs(&sync, &with_default(dirs))?;
            let attached = blocking(&sync, |s| s.attach_known_projects(open_store)).await?;
            info!(
                projects = sync.registry().paths().len(),
                reattached = attached,
                "Serving"
            );

            if config.sync.enabled {
                sync.start()?;
            }
            tokio::signal::ctrl_c().await?;
            info!("Interrupted, shutting down");
        }
        Command::Sync { dirs } => {
            register_dirs(&sync, &with_default(dirs))?;
            let report = blocking(&sync, |s| {
                s.attach_known_projects(open_store)?;
                s.force_sync()
            })
            .await?;
            print(cli.format, &report, format::format_report_markdown)?;
        }
        Command::Tasks => {
            // Attaching keeps the index rows; the forced pass is the one re-pull.
            let view = blocking(&sync, |s| {
                s.attach_known_projects(open_store)?;
                s.force_sync()?;
                s.global_tasks()
            })
            .await?;
            print(cli.format, &view, format::format_global_tasks_markdown)?;
        }
        Command::Projects => {
            let projects = sync.list_active_projects()?;
            print(cli.format, projects.as_slice(), format::format_projects_markdown)?;
        }
        Command::Toggle { id, undo } => {
            let completed = !undo;
            let outcome = blocking(&sync, move |s| {
                s.attach_known_projects(open_store)?;
                s.set_global_task_completion(id, completed)
            })
            .await?;
            print(cli.format, &outcome, |o| {
                format::format_propagation_markdown(id, completed, o)
            })?;
        }
        Command::Note(command) => {
            let store = Arc::new(ProjectTaskStore::open(&project)?);
            match command {
                NoteCommand::Add { content, title } => store.add_note(&title, &content)?,
                NoteCommand::Edit {
                    index,
                    content,
                    title,
                } => store.update_note(index, &title, &content)?,
                NoteCommand::Rm { index } => store.delete_note(index)?,
            }
            sync.register_project(&project, store.clone())?;
            let open = store.active_tasks();
            print(cli.format, open.as_slice(), format::format_local_tasks_markdown)?;
        }
        Command::Check { index, undo } => {
            let store = Arc::new(ProjectTaskStore::open(&project)?);
            store.update_task(index, !undo)?;
            sync.register_project(&project, store.clone())?;
            let open = store.active_tasks();
            print(cli.format, open.as_slice(), format::format_local_tasks_markdown)?;
        }
        Command::Local => {
            let store = ProjectTaskStore::open(&project)?;
            let open = store.active_tasks();
            print(cli.format, open.as_slice(), format::format_local_tasks_markdown)?;
        }
    }

    sync.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = ConfigLoader::load(cli.config.clone())?.into_config();
    if let Some(db_path) = &cli.database {
        config.index.db_path = db_path.clone();
    }
    config.validate()?;

    run(cli, config).await
}

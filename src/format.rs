//! Output formatting for the command line: markdown for people, JSON for scripts.

use crate::notes::parser::strip_marker;
use crate::sync::{Propagation, SyncReport};
use crate::types::{GlobalTask, GlobalTasks, Project, TaskInfo};
use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

/// Render `value` as pretty JSON or with the given markdown formatter.
pub fn render<T, F>(format: OutputFormat, value: &T, markdown: F) -> serde_json::Result<String>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value),
        OutputFormat::Markdown => Ok(markdown(value)),
    }
}

/// Milliseconds since the epoch as local `YYYY-MM-DD HH:MM:SS`.
pub fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| ms.to_string())
}

fn checkbox(completed: bool) -> &'static str {
    if completed { "[x]" } else { "[ ]" }
}

fn format_global_task_short(task: &GlobalTask) -> String {
    format!(
        "- {} {} `#{}`\n",
        checkbox(task.completed),
        strip_marker(&task.content),
        task.id
    )
}

/// Combined view grouped by project, with per-project counts.
pub fn format_global_tasks_markdown(view: &GlobalTasks) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Tasks ({})\n\n", view.total));

    for summary in &view.summaries {
        md.push_str(&format!("## {}\n", summary.folder_path));
        md.push_str(&format!(
            "_{} pending, {} done_",
            summary.pending_tasks, summary.completed_tasks
        ));
        if let Some(ms) = summary.last_updated {
            md.push_str(&format!(" _(updated {})_", format_ms(ms)));
        }
        md.push_str("\n\n");

        let mut any = false;
        for task in view
            .tasks
            .iter()
            .filter(|t| t.folder_path == summary.folder_path)
        {
            md.push_str(&format_global_task_short(task));
            any = true;
        }
        if any {
            md.push('\n');
        }
    }

    md
}

pub fn format_projects_markdown(projects: &[Project]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Projects ({})\n\n", projects.len()));
    for project in projects {
        md.push_str(&format!(
            "- `{}` {} (last sync {})\n",
            project.id,
            project.path,
            format_ms(project.last_scan)
        ));
    }

    md
}

pub fn format_report_markdown(report: &SyncReport) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "# Sync\n\n- **synced**: {}\n- **skipped**: {}\n- **removed**: {}\n- **failed**: {}\n",
        report.synced.len(),
        report.skipped.len(),
        report.removed.len(),
        report.failures.len()
    ));

    for path in &report.removed {
        md.push_str(&format!("\nRemoved `{}`", path.display()));
    }
    for (path, error) in &report.failures {
        md.push_str(&format!("\nFailed `{}`: {}", path.display(), error));
    }
    if !report.removed.is_empty() || !report.failures.is_empty() {
        md.push('\n');
    }

    md
}

/// Open tasks of one project.
pub fn format_local_tasks_markdown(tasks: &[TaskInfo]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Open tasks ({})\n\n", tasks.len()));
    for task in tasks {
        let source = if task.note_title.is_empty() {
            task.timestamp.clone()
        } else {
            format!("{}, {}", task.note_title, task.timestamp)
        };
        md.push_str(&format!("- `{}` {} _({})_\n", task.index, task.text, source));
    }

    md
}

pub fn format_propagation_markdown(id: i64, completed: bool, outcome: &Propagation) -> String {
    let state = if completed { "done" } else { "open" };
    let detail = match outcome {
        Propagation::Applied => "note file updated".to_string(),
        Propagation::NoMatch => "no matching task in the note file".to_string(),
        Propagation::NotAttached => "project not attached, index only".to_string(),
        Propagation::StoreFailed(e) => format!("note file not updated: {}", e),
    };
    format!("Task `#{}` marked {} ({})\n", id, state, detail)
}

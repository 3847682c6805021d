//! CLI command definitions for crossnote
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Per-project checklists in notes.md, with one combined view across projects
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the task index database (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Project folder for project-local commands (default: current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register projects and keep the index in sync until interrupted
    Serve {
        /// Project folders to register (default: --project)
        dirs: Vec<PathBuf>,
    },

    /// Register projects and sync every known project once
    Sync {
        /// Project folders to register (default: --project)
        dirs: Vec<PathBuf>,
    },

    /// Show the combined task view across all projects
    Tasks,

    /// List active projects
    Projects,

    /// Mark a task in the combined view done, and carry it into its note file
    Toggle {
        /// Task id as shown by `tasks`
        id: i64,

        /// Mark the task open instead
        #[arg(long)]
        undo: bool,
    },

    /// Edit the notes of the project
    #[command(subcommand)]
    Note(NoteCommand),

    /// Mark a task of the project done
    Check {
        /// Task index as shown by `local`
        index: usize,

        /// Mark the task open instead
        #[arg(long)]
        undo: bool,
    },

    /// List open tasks of the project
    Local,
}

#[derive(Subcommand, Debug)]
pub enum NoteCommand {
    /// Add a note at the top of notes.md
    Add {
        /// Note content; checkbox items like `- [ ] task` become tasks
        #[arg(allow_hyphen_values = true)]
        content: String,

        #[arg(short, long, default_value = "")]
        title: String,
    },

    /// Replace the title and content of a note
    Edit {
        /// Note position, 0 is the newest
        index: usize,

        #[arg(allow_hyphen_values = true)]
        content: String,

        #[arg(short, long, default_value = "")]
        title: String,
    },

    /// Delete a note
    Rm {
        /// Note position, 0 is the newest
        index: usize,
    },
}

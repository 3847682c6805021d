//! crossnote library
//!
//! Per-project note stores, the durable cross-project task index, and the
//! synchronizer that keeps them aligned.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod notes;
pub mod registry;
pub mod sync;
pub mod types;

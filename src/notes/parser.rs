//! Checkbox task extraction from note content.
//!
//! Parsing is a pure function of the content: the same text always yields the
//! same tasks in the same order.

use crate::types::Task;
use regex_lite::Regex;
use std::sync::LazyLock;

static CHECKBOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([xX ])\]").expect("checkbox pattern is valid"));

/// Marker glyph written for a checked task.
pub const CHECKED_MARK: &str = "[x]";
/// Marker glyph written for an unchecked task.
pub const UNCHECKED_MARK: &str = "[ ]";

/// Byte span of one checkbox marker inside note content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub start: usize,
    pub end: usize,
    pub checked: bool,
}

/// Locate every checkbox marker in scan order.
pub fn scan_markers(content: &str) -> Vec<Marker> {
    CHECKBOX
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let state = caps.get(1)?;
            Some(Marker {
                start: whole.start(),
                end: whole.end(),
                checked: state.as_str().eq_ignore_ascii_case("x"),
            })
        })
        .collect()
}

/// Parse the tasks of one note. Indices are note-local scan positions.
pub fn parse_tasks(content: &str) -> Vec<Task> {
    scan_markers(content)
        .into_iter()
        .enumerate()
        .map(|(index, marker)| Task {
            index,
            checked: marker.checked,
            text: line_from(content, marker.start),
        })
        .collect()
}

/// Text from `start` to the next line break, trimmed.
fn line_from(content: &str, start: usize) -> String {
    let rest = &content[start..];
    let end = rest.find('\n').unwrap_or(rest.len());
    rest[..end].trim().to_string()
}

/// Task text with its leading checkbox marker removed.
pub fn strip_marker(text: &str) -> String {
    text.replacen(CHECKED_MARK, "", 1)
        .replacen("[X]", "", 1)
        .replacen(UNCHECKED_MARK, "", 1)
        .trim()
        .to_string()
}

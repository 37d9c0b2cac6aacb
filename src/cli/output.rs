//! CLI output: error mapping and table/JSON presentation of trees and diffs.

use crate::error::{ApiError, StorageError};
use crate::snapshot::{Snapshot, SnapshotDiff};
use crate::tree::ChangeEvent;
use crate::value::Value;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    format!("{} {}", "error:".red().bold(), e)
}

fn heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "-".to_string(),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::from(e)))
}

/// Leaf table of one snapshot
pub fn format_snapshot_text(handle: &str, snapshot: &Snapshot) -> String {
    let mut out = format!(
        "{}\n",
        heading(&format!("{} ({})", handle, snapshot.name()))
    );
    if snapshot.is_empty() {
        out.push_str("No leaves.");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Kind", "Value"]);
    for (path, value) in snapshot.iter() {
        table.add_row(vec![
            path.to_string(),
            value.kind().to_string(),
            value.to_string(),
        ]);
    }
    out.push_str(&table.to_string());
    out
}

pub fn format_snapshot_json(snapshot: &Snapshot) -> Result<String, ApiError> {
    to_json(snapshot)
}

/// Differing paths of two snapshots
pub fn format_diff_text(left: &str, right: &str, diff: &SnapshotDiff) -> String {
    if diff.is_empty() {
        return format!("{} and {} hold the same values.", left, right);
    }
    let mut out = format!("{}\n", heading(&format!("{} vs {}", left, right)));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", left, right]);
    for (path, entry) in diff.iter() {
        table.add_row(vec![
            path.to_string(),
            cell(entry.left.as_ref()),
            cell(entry.right.as_ref()),
        ]);
    }
    out.push_str(&table.to_string());
    out.push_str(&format!("\n{} differing path(s)", diff.len()));
    out
}

pub fn format_diff_json(diff: &SnapshotDiff) -> Result<String, ApiError> {
    to_json(diff)
}

/// One line per change reported by `watch`
pub fn format_change_event(event: &ChangeEvent) -> String {
    format!(
        "{} {} -> {}",
        event.path.bold(),
        event.old.to_string().dimmed(),
        event.new.to_string().green()
    )
}

//! Response CSV files and the cumulative history file.
//!
//! Every evaluation session writes its own `responses/<timestamp>.csv` and
//! appends the same rows to `responses/history.csv`. Rows are
//! `prompt,response,sources`; the history header is written whenever the
//! history file is empty, and each completed session ends with a separator
//! row carrying the completion time.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::config::HISTORY_FILE_NAME;

pub const HEADER: [&str; 3] = ["prompt", "response", "sources"];
const SEPARATOR_CELL: &str = "-----------------";

/// True when the history file is missing, holds no CSV rows, or its first
/// cell is blank once spaces are removed.
pub fn is_history_empty(path: &Path) -> bool {
    let Ok(mut reader) = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
    else {
        return true;
    };
    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record
            .get(0)
            .map_or(true, |cell| cell.chars().all(|c| c == ' ')),
        _ => true,
    }
}

/// Append one row, creating the file (and its directory) if needed.
pub fn append_row(path: &Path, row: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
    writer.write_record(row)?;
    writer.flush()?;
    Ok(())
}

/// Append a row to the history, writing the header first if it is empty.
pub fn append_history_row(path: &Path, row: &[&str]) -> Result<()> {
    if is_history_empty(path) {
        append_row(path, &HEADER)?;
    }
    append_row(path, row)
}

/// Append the end-of-session marker.
pub fn append_session_end(path: &Path, at: chrono::DateTime<chrono::Local>) -> Result<()> {
    let marker = format!("End of file ----- {}", at.format("%Y-%m-%d %H:%M:%S%.6f"));
    append_row(path, &[SEPARATOR_CELL, &marker, SEPARATOR_CELL])
}

/// Create a fresh per-session response file with its header row.
///
/// Named after the start time; a numeric suffix avoids clobbering a file
/// from the same second.
pub fn create_response_file(dir: &Path, at: chrono::DateTime<chrono::Local>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let stem = at.format("%Y-%m-%d_%H-%M-%S").to_string();

    let mut path = dir.join(format!("{}.csv", stem));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}-{}.csv", stem, n));
        n += 1;
    }

    append_row(&path, &HEADER)?;
    Ok(path)
}

/// Truncate the history file to zero bytes.
pub fn clear_history(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, b"")
        .with_context(|| format!("Failed to clear {}", path.display()))?;
    tracing::info!(path = %path.display(), "history cleared");
    Ok(())
}

/// Delete every entry of the responses directory except the history file
/// and `keep`. Returns how many entries were removed.
pub fn prune_responses(dir: &Path, keep: Option<&str>) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == HISTORY_FILE_NAME || Some(&*name) == keep {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        tracing::debug!(path = %path.display(), "removed response file");
        removed += 1;
    }
    Ok(removed)
}

/// CLI: `rfp history show`.
pub fn run_history_show(path: &Path) -> Result<()> {
    if is_history_empty(path) {
        println!("History is empty ({}).", path.display());
        return Ok(());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    print!("{}", content);
    Ok(())
}

/// CLI: `rfp history clear`.
pub fn run_history_clear(path: &Path) -> Result<()> {
    clear_history(path)?;
    println!("Cleared {}", path.display());
    Ok(())
}

/// CLI: `rfp responses prune`.
pub fn run_responses_prune(dir: &Path, keep: Option<&str>) -> Result<()> {
    let removed = prune_responses(dir, keep)?;
    println!("Removed {} response file(s) from {}", removed, dir.display());
    Ok(())
}

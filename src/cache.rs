//! JSON cache artifacts for normalized records.
//!
//! Each source branch writes its records to one JSON file, an array of
//! `{page_content, metadata: {source, title}}` objects. A missing or
//! zero-byte file counts as empty and triggers a re-fetch of that branch.
//! Writes go to a sibling temp file which is renamed into place, so a failed
//! fetch never leaves a half-written cache behind.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::models::Record;

/// True when the cache file is missing or zero bytes long.
pub fn is_empty(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    }
}

pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cache file: {}", path.display()))?;
    let records: Vec<Record> = serde_json::from_str(&content)
        .with_context(|| format!("Malformed cache file: {}", path.display()))?;
    Ok(records)
}

pub fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write cache file: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace cache file: {}", path.display()))?;
    Ok(())
}

/// Empty the cache file in place, creating it if needed.
pub fn truncate(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, b"")
        .with_context(|| format!("Failed to truncate cache file: {}", path.display()))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

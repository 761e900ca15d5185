use chrono::{DateTime, Local};

use crate::{Res, error::PanError, types::{FileEntry, FileEntryTableRow}};

/// Validates a remote path and strips a trailing slash.
///
/// Remote paths are absolute and use `/` as separator; the root stays `/`.
pub fn normalize_remote_path(path: &str) -> Res<String> {
    let path = path.trim();
    if !path.starts_with('/') {
        return Err(PanError::InvalidPath(format!(
            "{path:?} must be absolute (start with '/')"
        )));
    }
    if path.split('/').any(|seg| seg == "." || seg == "..") {
        return Err(PanError::InvalidPath(format!(
            "{path:?} must not contain '.' or '..' segments"
        )));
    }

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok("/".to_string());
    }
    Ok(trimmed.to_string())
}

/// Splits a remote path into its parent directory and final component.
pub fn split_remote_path(path: &str) -> Res<(String, String)> {
    let path = normalize_remote_path(path)?;
    if path == "/" {
        return Err(PanError::InvalidPath("the root has no parent".to_string()));
    }

    let idx = path.rfind('/').unwrap_or(0);
    let parent = if idx == 0 { "/" } else { &path[..idx] };
    Ok((parent.to_string(), path[idx + 1..].to_string()))
}

/// Joins a remote directory and a child name.
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Renders a unix timestamp in local time, `-` when unset.
pub fn format_timestamp(secs: i64) -> String {
    if secs <= 0 {
        return "-".to_string();
    }
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

pub fn to_table_row(entry: &FileEntry) -> FileEntryTableRow {
    FileEntryTableRow {
        kind: if entry.is_directory { "dir" } else { "file" }.to_string(),
        name: entry.server_filename.clone(),
        path: entry.path.clone(),
        size: if entry.is_directory {
            "-".to_string()
        } else {
            format_bytes(entry.size)
        },
        created: format_timestamp(entry.created_at),
        modified: format_timestamp(entry.modified_at),
    }
}

/// Directories first, then by name.
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.server_filename.cmp(&b.server_filename))
    });
}

//! File Discovery Module
//!
//! Recursive lookup of report files and archives below a directory.

use crate::error::{DmarcError, Result};
use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Returns true if `path` ends with one of `extensions` (case-insensitive,
/// without the leading dot).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Recursively collects the files under `root` matching `extensions`.
///
/// Entries that cannot be read are logged and skipped. The order follows the
/// walk; callers should not depend on it across files.
///
/// # Errors
///
/// Returns [`DmarcError::MissingInput`] if `root` is not an existing directory.
pub fn find_files(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(DmarcError::MissingInput(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

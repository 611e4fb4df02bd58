//! Utility functions for the library

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::trace;

use crate::error::Result;

/// Expands a leading `~` to the user's home directory and normalizes the
/// result.
///
/// This function removes redundant components (e.g., `../`, `./`) without
/// touching the filesystem, so the path does not need to exist.
///
/// # Arguments
///
/// * `path` - The path to expand.
///
/// # Returns
///
/// A `PathBuf` containing the expanded and normalized path.
pub fn expand_path(path: &Path) -> PathBuf {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match home::home_dir() {
            Some(home_dir) => home_dir.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };

    expanded.clean()
}

/// Strips a leading UTF-8 byte order mark.
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

/// Writes `contents` to `path` so that readers never observe a partially
/// written file.
///
/// The data is written to a temporary file next to the target, flushed to
/// disk, and then renamed over the target. Missing parent directories are
/// created.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    // Unique per call; deleted on drop unless persisted.
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(&parent)?;

    trace!("Writing {} bytes to {}", contents.len(), temp.path().display());
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

//! Filesystem helpers with contexted errors.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Ensure a directory exists, creating it (and parents) if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("couldn't create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to a string.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("couldn't read file: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("couldn't write file: {}", path.display()))
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("couldn't remove directory: {}", path.display()))?;
    }
    Ok(())
}

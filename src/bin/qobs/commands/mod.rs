//! Command implementations.

pub mod add;
pub mod build;
pub mod clean;
pub mod remove;

use std::path::PathBuf;

use anyhow::{Context, Result};
use qobs::core::manifest::{find_manifest, MANIFEST_NAME};

/// Locate the manifest starting from `path` (or the current directory).
pub fn locate_manifest(path: Option<PathBuf>) -> Result<PathBuf> {
    let start = match path {
        Some(p) => p,
        None => std::env::current_dir()?,
    };
    find_manifest(&start).with_context(|| {
        format!(
            "{} not found in `{}` or any parent directory",
            MANIFEST_NAME,
            start.display()
        )
    })
}

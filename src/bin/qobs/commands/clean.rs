//! `qobs clean` - remove the build directory.

use anyhow::{Context, Result};
use qobs::util::fs::remove_dir_all_if_exists;
use tracing::info;

use crate::cli::CleanArgs;
use crate::commands::locate_manifest;

pub fn execute(args: CleanArgs) -> Result<()> {
    let manifest_path = locate_manifest(args.path)?;
    let root = manifest_path
        .parent()
        .context("manifest has no parent directory")?;

    let build_dir = root.join("build");
    remove_dir_all_if_exists(&build_dir)?;
    info!("removed {}", build_dir.display());
    Ok(())
}

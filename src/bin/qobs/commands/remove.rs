//! `qobs remove` - remove a dependency from Qobs.toml.

use anyhow::Result;
use qobs::ops;

use crate::cli::RemoveArgs;
use crate::commands::locate_manifest;

pub fn execute(args: RemoveArgs) -> Result<()> {
    let manifest_path = locate_manifest(None)?;
    ops::remove_dependency(&manifest_path, &args.name)
}

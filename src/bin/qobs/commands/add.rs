//! `qobs add` - add a dependency to Qobs.toml.

use anyhow::Result;
use qobs::ops::{self, AddOptions};

use crate::cli::AddArgs;
use crate::commands::locate_manifest;

pub fn execute(args: AddArgs) -> Result<()> {
    let manifest_path = locate_manifest(None)?;

    ops::add_dependency(
        &manifest_path,
        &AddOptions {
            name: args.name,
            value: args.value,
            path: args.path,
        },
    )
}

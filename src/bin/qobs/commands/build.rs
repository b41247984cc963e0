//! `qobs build` - compile a package and its dependencies.

use anyhow::Result;
use qobs::ops::{self, BuildOptions};

use crate::cli::BuildArgs;

pub fn execute(args: BuildArgs) -> Result<()> {
    let artifact = ops::build(&BuildOptions {
        path: args.path,
        compiler: args.compiler,
        build_dir: args.build_dir,
    })?;

    println!("{}", artifact.display());
    Ok(())
}

//! Implementation of `qobs build`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, trace};

use crate::builder::{BuildRunner, NinjaGenerator};
use crate::core::manifest::{find_manifest, Manifest, MANIFEST_NAME};

/// Options for building a package.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Where to start looking for the manifest. Defaults to the current
    /// directory.
    pub path: Option<PathBuf>,

    /// Compiler override (highest precedence in the locator).
    pub compiler: Option<String>,

    /// Project build directory. Defaults to `{package_root}/build`.
    pub build_dir: Option<PathBuf>,
}

/// Build the package at (or above) `opts.path` and return the root
/// artifact path.
pub fn build(opts: &BuildOptions) -> Result<PathBuf> {
    let mut path = match &opts.path {
        Some(p) => p.clone(),
        None => std::env::current_dir()?,
    };
    if path.is_relative() {
        trace!("path `{}` is relative, promoting to absolute", path.display());
        path = std::env::current_dir()?.join(path);
    }
    debug!("building package: {}", path.display());

    let manifest_path = find_manifest(&path).with_context(|| {
        format!(
            "{} not found in `{}` or any parent directory",
            MANIFEST_NAME,
            path.display()
        )
    })?;

    let manifest = Manifest::load(&manifest_path)
        .with_context(|| format!("couldn't parse `{}`", manifest_path.display()))?;

    let root = manifest.root.clone();
    let build_dir = match &opts.build_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => root.join(dir),
        None => root.join("build"),
    };

    let mut runner = BuildRunner::new(
        build_dir,
        opts.compiler.clone(),
        Box::new(NinjaGenerator::new()),
    );
    let artifact = runner.build(manifest)?;

    info!("finished: {}", artifact.display());
    Ok(artifact)
}

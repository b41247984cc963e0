//! Source scanning: expand the manifest's glob patterns into concrete
//! file paths.

use std::path::PathBuf;

use anyhow::Result;
use glob::glob;
use tracing::{debug, trace, warn};

use crate::core::manifest::Manifest;

/// Expand the manifest's source patterns against its package root.
///
/// Patterns matching nothing warn and contribute zero files; that keeps
/// multi-pattern manifests working when only some patterns apply. Order
/// across patterns is pattern order; within one pattern, the glob
/// library's sorted enumeration.
pub fn scan_sources(manifest: &Manifest) -> Result<Vec<PathBuf>> {
    debug!("scanning files...");
    let mut files = Vec::new();

    for pattern in &manifest.target.sources {
        let effective = if manifest.target.glob_recurse {
            make_recursive(pattern)
        } else {
            pattern.clone()
        };

        // `qobs build` can run outside the package root, so the query is
        // anchored to the root rather than the current directory.
        let query = manifest.root.join(&effective);
        let query = query.to_string_lossy();
        trace!("globbing query: {}", query);

        let before = files.len();
        let paths = match glob(&query) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("invalid glob pattern `{}`: {}", pattern, e);
                continue;
            }
        };

        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => {
                    trace!("found source file: {}", path.display());
                    files.push(path);
                }
                Ok(_) => {}
                Err(e) => warn!("glob error: {}", e),
            }
        }

        if files.len() == before {
            warn!(
                "pattern `{}` matched no source files under {}",
                pattern,
                manifest.root.display()
            );
        }
    }

    debug!("queued {} file(s) for building", files.len());
    Ok(files)
}

/// Make a pattern match in subdirectories too by inserting a `**/`
/// segment before its final component. Patterns that already recurse are
/// left alone.
fn make_recursive(pattern: &str) -> String {
    if pattern.contains("**") {
        return pattern.to_string();
    }
    match pattern.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/**/{file}"),
        None => format!("**/{pattern}"),
    }
}

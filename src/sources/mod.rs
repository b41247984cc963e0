//! Dependency acquisition.
//!
//! `fetch` materializes a dependency's source tree on disk and returns its
//! absolute path. Local paths involve no I/O; version-control dependencies
//! are cloned; archive URLs are downloaded and extracted.

pub mod archive;
pub mod git;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::core::dependency::{Dependency, DependencyKind};
use crate::util::fs;

/// Fetch a dependency into `deps_root` and return the directory holding
/// its sources.
///
/// Version-control and archive dependencies land in
/// `{deps_root}/{name}-src`. A destination that already exists is reused
/// without touching the network, so repeated builds don't re-fetch.
pub fn fetch(dep: &Dependency, deps_root: &Path) -> Result<PathBuf> {
    match dep.kind() {
        DependencyKind::LocalPath => Ok(PathBuf::from(dep.location())),

        DependencyKind::VersionControl => {
            let dest = deps_root.join(format!("{}-src", dep.name()));
            if dest.exists() {
                debug!("`{}` already fetched at {}", dep.name(), dest.display());
                return Ok(dest);
            }
            fs::ensure_dir(deps_root)?;
            git::clone(dep, &dest)?;
            Ok(dest)
        }

        DependencyKind::ArchiveUrl => {
            let dest = deps_root.join(format!("{}-src", dep.name()));
            if dest.exists() {
                debug!("`{}` already fetched at {}", dep.name(), dest.display());
                return Ok(dest);
            }
            fs::ensure_dir(deps_root)?;
            archive::download_and_extract(dep, &dest)?;
            Ok(dest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_path_returns_location_unchanged() {
        let dep = {
            let table: toml::Table = toml::from_str(r#"path = "/abs/mylib""#).unwrap();
            Dependency::from_table("mylib", &table, Path::new("/proj")).unwrap()
        };
        let tmp = TempDir::new().unwrap();

        let path = fetch(&dep, tmp.path()).unwrap();
        assert_eq!(path, PathBuf::from("/abs/mylib"));
        // No directory was created under deps_root.
        assert!(std::fs::read_dir(tmp.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_existing_fetch_dir_is_reused() {
        let dep = Dependency::from_str_value("json", "gh:nlohmann/json");
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("json-src");
        std::fs::create_dir_all(&dest).unwrap();

        // Would need the network if it tried to clone.
        let path = fetch(&dep, tmp.path()).unwrap();
        assert_eq!(path, dest);
    }
}

//! Implementation of `qobs add` and `qobs remove`.
//!
//! Both edit the manifest through the round-trip serializer: parse,
//! mutate the dependency list, save.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;

use crate::core::dependency::Dependency;
use crate::core::manifest::{Manifest, MANIFEST_NAME};

/// Options for adding a dependency.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Dependency name (the key in `[dependencies]`).
    pub name: String,

    /// String value: URL, git remote, or shortcut, with an optional pin.
    pub value: Option<String>,

    /// Local path dependency.
    pub path: Option<String>,
}

/// Add a dependency to the manifest at `manifest_path`.
pub fn add_dependency(manifest_path: &Path, opts: &AddOptions) -> Result<()> {
    let mut manifest = Manifest::load(manifest_path)?;

    let dep = if let Some(path) = &opts.path {
        let mut table = toml::Table::new();
        table.insert("path".to_string(), toml::Value::String(path.clone()));
        Dependency::from_table(&opts.name, &table, &manifest.root)?
    } else if let Some(value) = &opts.value {
        Dependency::from_str_value(&opts.name, value)
    } else {
        bail!("dependency `{}` needs either a value or `--path`", opts.name);
    };

    if manifest.has_dependency(dep.name(), dep.value()) {
        bail!("dependency `{}` is already declared in {}", opts.name, MANIFEST_NAME);
    }

    info!("adding dependency `{}` = `{}`", dep.name(), dep.value());
    manifest.dependencies.push(dep);
    manifest.save(manifest_path)
}

/// Remove a dependency from the manifest at `manifest_path`.
pub fn remove_dependency(manifest_path: &Path, name: &str) -> Result<()> {
    let mut manifest = Manifest::load(manifest_path)?;

    let before = manifest.dependencies.len();
    manifest.dependencies.retain(|dep| dep.name() != name);
    if manifest.dependencies.len() == before {
        bail!("dependency `{}` not found in {}", name, MANIFEST_NAME);
    }

    info!("removing dependency `{}`", name);
    manifest.save(manifest_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn seed_manifest(dir: &Path) -> PathBuf {
        let path = dir.join(MANIFEST_NAME);
        std::fs::write(
            &path,
            "[package]\nname = \"test\"\n\n[target]\nsources = [\"src/*.c\"]\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_add_string_dependency() {
        let tmp = TempDir::new().unwrap();
        let manifest_path = seed_manifest(tmp.path());

        add_dependency(
            &manifest_path,
            &AddOptions {
                name: "json".to_string(),
                value: Some("gh:nlohmann/json@3.11.3".to_string()),
                path: None,
            },
        )
        .unwrap();

        let content = std::fs::read_to_string(&manifest_path).unwrap();
        assert!(content.contains("json = \"gh:nlohmann/json@3.11.3\""));

        let manifest = Manifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.dependencies.len(), 1);
        assert_eq!(
            manifest.dependencies[0].location(),
            "https://github.com/nlohmann/json"
        );
    }

    #[test]
    fn test_add_path_dependency() {
        let tmp = TempDir::new().unwrap();
        let manifest_path = seed_manifest(tmp.path());

        add_dependency(
            &manifest_path,
            &AddOptions {
                name: "mylib".to_string(),
                value: None,
                path: Some("../mylib".to_string()),
            },
        )
        .unwrap();

        let content = std::fs::read_to_string(&manifest_path).unwrap();
        assert!(content.contains("mylib"));
        assert!(content.contains("path"));

        let manifest = Manifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.dependencies.len(), 1);
    }

    #[test]
    fn test_duplicate_dependency_rejected() {
        let tmp = TempDir::new().unwrap();
        let manifest_path = seed_manifest(tmp.path());

        let opts = AddOptions {
            name: "json".to_string(),
            value: Some("gh:nlohmann/json".to_string()),
            path: None,
        };
        add_dependency(&manifest_path, &opts).unwrap();

        let err = add_dependency(&manifest_path, &opts).unwrap_err();
        assert!(err.to_string().contains("already declared"));
    }

    #[test]
    fn test_remove_dependency() {
        let tmp = TempDir::new().unwrap();
        let manifest_path = seed_manifest(tmp.path());

        add_dependency(
            &manifest_path,
            &AddOptions {
                name: "json".to_string(),
                value: Some("gh:nlohmann/json".to_string()),
                path: None,
            },
        )
        .unwrap();
        remove_dependency(&manifest_path, "json").unwrap();

        let manifest = Manifest::load(&manifest_path).unwrap();
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_remove_missing_dependency_fails() {
        let tmp = TempDir::new().unwrap();
        let manifest_path = seed_manifest(tmp.path());

        let err = remove_dependency(&manifest_path, "ghost").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_add_preserves_existing_dependencies() {
        let tmp = TempDir::new().unwrap();
        let manifest_path = seed_manifest(tmp.path());

        add_dependency(
            &manifest_path,
            &AddOptions {
                name: "first".to_string(),
                value: Some("gh:a/first".to_string()),
                path: None,
            },
        )
        .unwrap();
        add_dependency(
            &manifest_path,
            &AddOptions {
                name: "second".to_string(),
                value: Some("gh:b/second".to_string()),
                path: None,
            },
        )
        .unwrap();

        let manifest = Manifest::load(&manifest_path).unwrap();
        let names: Vec<&str> = manifest.dependencies.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}

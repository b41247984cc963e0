//! Dependency descriptors.
//!
//! A descriptor is the parsed form of one `[dependencies]` entry. String
//! values name a git remote or an archive URL, optionally pinned with a
//! `#commit` or `@tag` suffix and optionally abbreviated with a hosting
//! shortcut:
//!
//! - `gh:nlohmann/json`
//! - `gh:nlohmann/json#960b763`
//! - `gh:nlohmann/json@3.11.3`
//! - `https://github.com/nlohmann/json`
//! - `https://example.com/my-package.tar.gz`
//!
//! Table values select a local path: `dep = { path = "/path/to/dep" }`.

use std::path::Path;

use crate::errors::Error;

/// Where a dependency's sources come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// A git remote, cloned into the dependency root.
    VersionControl,
    /// An archive to download and extract.
    ArchiveUrl,
    /// A directory already on disk.
    LocalPath,
}

/// An optional version pin carried by a string descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionPin {
    /// No pin; the default branch (or archive contents) are used as-is.
    #[default]
    None,
    /// A commit hash, e.g. `960b763` or a full 40-char id.
    Commit(String),
    /// A tag name, e.g. `3.11.3` or any ref under `refs/tags/`.
    Tag(String),
}

/// Hosting shortcuts, expanded during parsing.
const SHORTCUTS: &[(&str, &str)] = &[
    ("gh:", "https://github.com/"),
    ("gl:", "https://gitlab.com/"),
    ("bb:", "https://bitbucket.org/"),
    ("sr:", "https://sr.ht/"),
    ("cb:", "https://codeberg.org/"),
];

/// One parsed `[dependencies]` entry.
#[derive(Debug, Clone)]
pub struct Dependency {
    /// `dep` in `dep = "gh:nlohmann/json"`.
    name: String,

    /// The raw value, as written in the TOML file.
    value: String,

    /// What `location` refers to.
    kind: DependencyKind,

    /// The canonical location: shortcuts expanded, pin suffix stripped.
    location: String,

    /// Version pin parsed from the value's suffix.
    pin: VersionPin,
}

impl Dependency {
    /// Parse a string-valued dependency. Never fails: every string is a
    /// git remote or an archive URL.
    pub fn from_str_value(name: &str, value: &str) -> Self {
        let mut kind = DependencyKind::ArchiveUrl;
        let mut location = String::new();
        let mut pin = VersionPin::None;

        // Split off the version pin, `#hash` before `@tag`, each at the
        // last occurrence of its delimiter.
        if let Some(pos) = value.rfind('#') {
            kind = DependencyKind::VersionControl;
            location = value[..pos].to_string();
            let suffix = &value[pos + 1..];
            if !suffix.is_empty() {
                pin = VersionPin::Commit(suffix.to_string());
            }
        } else if let Some(pos) = value.rfind('@') {
            kind = DependencyKind::VersionControl;
            location = value[..pos].to_string();
            let suffix = &value[pos + 1..];
            if !suffix.is_empty() {
                pin = VersionPin::Tag(suffix.to_string());
            }
        }

        if location.is_empty() {
            location = value.to_string();
        }

        // Expand hosting shortcuts, e.g. `gh:nlohmann/json` ->
        // `https://github.com/nlohmann/json`.
        for (prefix, url) in SHORTCUTS {
            if let Some(rest) = location.strip_prefix(prefix) {
                kind = DependencyKind::VersionControl;

                // sr.ht users start with ~, add it if not provided already
                if *prefix == "sr:" && !rest.starts_with('~') {
                    location = format!("{url}~{rest}");
                } else {
                    location = format!("{url}{rest}");
                }
                break;
            }
        }

        Dependency {
            name: name.to_string(),
            value: value.to_string(),
            kind,
            location,
            pin,
        }
    }

    /// Parse a table-valued dependency: `dep = { path = "…" }`. Relative
    /// paths are resolved against the enclosing package's root so builds
    /// started outside the package directory read the right tree.
    pub fn from_table(name: &str, table: &toml::Table, package_root: &Path) -> Result<Self, Error> {
        let mut path = None;

        for (key, value) in table {
            if key != "path" {
                return Err(Error::BadDependency {
                    name: name.to_string(),
                    reason: format!("unrecognized key `{key}`"),
                });
            }
            let Some(s) = value.as_str() else {
                return Err(Error::BadDependency {
                    name: name.to_string(),
                    reason: format!("`path` is of type `{}`, expected `string`", value.type_str()),
                });
            };
            let p = Path::new(s);
            path = Some(if p.is_relative() {
                package_root.join(p)
            } else {
                p.to_path_buf()
            });
        }

        let Some(path) = path else {
            return Err(Error::BadDependency {
                name: name.to_string(),
                reason: "missing `path` key".to_string(),
            });
        };

        let value = path.to_string_lossy().into_owned();
        Ok(Dependency {
            name: name.to_string(),
            value: value.clone(),
            kind: DependencyKind::LocalPath,
            location: value,
            pin: VersionPin::None,
        })
    }

    /// The key used in the manifest's `[dependencies]` section.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw value, as written in the TOML file.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    /// The canonical location: shortcut-expanded, version-stripped.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn pin(&self) -> &VersionPin {
        &self.pin
    }
}

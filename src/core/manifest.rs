//! Qobs.toml parsing and serialization.
//!
//! Parsing is deliberately tolerant: a field of the wrong type logs a
//! warning and falls back to its default, and malformed array elements or
//! dependency entries are skipped with a warning. Only a missing
//! `package.name` is fatal, since nothing downstream can identify the
//! package without it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml_edit::{value, Array, DocumentMut, InlineTable, Item, Table};
use tracing::{debug, trace, warn};

use crate::core::dependency::{Dependency, DependencyKind};
use crate::errors::Error;

/// The manifest file name.
pub const MANIFEST_NAME: &str = "Qobs.toml";

/// Default source globs when `[target] sources` is absent.
const DEFAULT_SOURCES: &[&str] = &["src/*.cpp", "src/*.cc", "src/*.c"];

/// What a package builds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageKind {
    /// An executable.
    #[default]
    App,
    /// A static library.
    Lib,
}

/// The `[package]` section.
#[derive(Debug, Clone, Default)]
pub struct PackageSection {
    /// Package name. Field: `name`. Required; the authoritative graph key.
    pub name: String,

    /// Package description. Field: `description`
    pub description: String,

    /// Package authors. Field: `authors`
    pub authors: Vec<String>,

    /// Package kind ("app" or "lib"). Field: `type`. Defaults to app.
    pub kind: PackageKind,

    /// Include directories exported to consumers. Field:
    /// `public_include_dirs`. Libraries only.
    pub public_include_dirs: Vec<String>,
}

/// The `[target]` section.
#[derive(Debug, Clone)]
pub struct TargetSection {
    /// Source glob patterns. Field: `sources`
    pub sources: Vec<String>,

    /// Glob recursively into subdirectories. Field: `glob_recurse`
    pub glob_recurse: bool,

    /// Compiler flags for this package only. Field: `cflags`
    pub cflags: String,

    /// Linker flags for this package only. Field: `ldflags`
    pub ldflags: String,

    /// Compiler flags contributed to every consumer. Field: `public_cflags`
    pub public_cflags: String,

    /// Linker flags contributed to every consumer. Field: `public_ldflags`
    pub public_ldflags: String,

    /// Prefer a C++ compiler over a C compiler. Field: `cxx`
    pub cxx: bool,
}

impl Default for TargetSection {
    fn default() -> Self {
        TargetSection {
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            glob_recurse: true,
            cflags: String::new(),
            ldflags: String::new(),
            public_cflags: String::new(),
            public_ldflags: String::new(),
            cxx: false,
        }
    }
}

/// The parsed Qobs.toml manifest. Immutable for the duration of a build.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// `[package]`
    pub package: PackageSection,

    /// `[target]`
    pub target: TargetSection,

    /// `[dependencies]`, in declaration order.
    pub dependencies: Vec<Dependency>,

    /// Absolute path of the directory containing this manifest.
    pub root: PathBuf,
}

/// Search for Qobs.toml in `start` or any of its parent directories.
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        let candidate = dir.join(MANIFEST_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        trace!("no {} inside `{}`", MANIFEST_NAME, dir.display());
        dir = dir.parent()?;
    }
}

fn warn_element_not_string(array: &str, index: usize, element: &toml::Value) -> bool {
    if !element.is_str() {
        warn!(
            "{} element at index {} is of type `{}`, expected `string`",
            array,
            index,
            element.type_str()
        );
        return true;
    }
    false
}

/// Read a string field, warning when it has the wrong type.
fn string_field(section: &toml::Table, field: &str, qualified: &str) -> Option<String> {
    match section.get(field) {
        None => None,
        Some(toml::Value::String(s)) => Some(s.clone()),
        Some(other) => {
            warn!(
                "`{}` is of type `{}`, expected `string`",
                qualified,
                other.type_str()
            );
            None
        }
    }
}

/// Read a bool field, warning when it has the wrong type.
fn bool_field(section: &toml::Table, field: &str, qualified: &str) -> Option<bool> {
    match section.get(field) {
        None => None,
        Some(toml::Value::Boolean(b)) => Some(*b),
        Some(other) => {
            warn!(
                "`{}` is of type `{}`, expected `boolean`",
                qualified,
                other.type_str()
            );
            None
        }
    }
}

/// Collect the string elements of an array field, skipping (and warning
/// about) anything else.
fn string_array(array: &toml::value::Array, what: &str) -> Vec<String> {
    let mut out = Vec::new();
    for (i, element) in array.iter().enumerate() {
        if warn_element_not_string(what, i, element) {
            continue;
        }
        if let Some(s) = element.as_str() {
            out.push(s.to_string());
        }
    }
    out
}

impl PackageSection {
    fn parse(section: Option<&toml::Value>) -> Result<Self> {
        let empty = toml::Table::new();
        let table = match section {
            Some(toml::Value::Table(t)) => t,
            Some(other) => {
                warn!(
                    "`package` is of type `{}`, expected `table`",
                    other.type_str()
                );
                &empty
            }
            None => &empty,
        };

        let name = match table.get("name") {
            Some(toml::Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => {
                return Err(Error::MissingRequiredField {
                    field: "package.name",
                }
                .into())
            }
        };

        let description = string_field(table, "description", "package.description")
            .unwrap_or_default();

        let mut authors = Vec::new();
        match table.get("authors") {
            None => {}
            Some(toml::Value::Array(arr)) => authors = string_array(arr, "`package.authors`"),
            Some(other) => warn!(
                "`package.authors` is of type `{}`, expected `array`",
                other.type_str()
            ),
        }

        let kind = match table.get("type") {
            None => PackageKind::default(),
            Some(toml::Value::String(s)) => match s.as_str() {
                "app" => PackageKind::App,
                "lib" => PackageKind::Lib,
                other => {
                    warn!(
                        "`package.type` has invalid value `{}`, expected \"app\" or \"lib\". \
                         Defaulting to \"app\".",
                        other
                    );
                    PackageKind::App
                }
            },
            Some(other) => {
                warn!(
                    "`package.type` is of type `{}`, expected `string`. Defaulting to \"app\".",
                    other.type_str()
                );
                PackageKind::App
            }
        };

        let mut public_include_dirs = Vec::new();
        if let Some(dirs) = table.get("public_include_dirs") {
            if kind == PackageKind::Lib {
                match dirs {
                    toml::Value::Array(arr) => {
                        public_include_dirs = string_array(arr, "`package.public_include_dirs`")
                    }
                    other => warn!(
                        "`package.public_include_dirs` is of type `{}`, expected `array` of \
                         strings for library packages",
                        other.type_str()
                    ),
                }
            } else {
                let silent = matches!(dirs, toml::Value::Array(arr) if arr.is_empty());
                if !silent {
                    warn!(
                        "`package.public_include_dirs` is specified for application package \
                         `{}`, but it's only used for library packages. This field will be \
                         ignored.",
                        name
                    );
                }
            }
        }

        Ok(PackageSection {
            name,
            description,
            authors,
            kind,
            public_include_dirs,
        })
    }
}

impl TargetSection {
    fn parse(section: Option<&toml::Value>) -> Self {
        let mut target = TargetSection::default();

        let table = match section {
            Some(toml::Value::Table(t)) => t,
            Some(other) => {
                warn!(
                    "`target` is of type `{}`, expected `table`",
                    other.type_str()
                );
                return target;
            }
            None => return target,
        };

        match table.get("sources") {
            None => {}
            Some(toml::Value::Array(arr)) => target.sources = string_array(arr, "`target.sources`"),
            Some(other) => warn!(
                "`target.sources` is of type `{}`, expected `array`",
                other.type_str()
            ),
        }

        if let Some(recurse) = bool_field(table, "glob_recurse", "target.glob_recurse") {
            target.glob_recurse = recurse;
        }
        if let Some(flags) = string_field(table, "cflags", "target.cflags") {
            target.cflags = flags;
        }
        if let Some(flags) = string_field(table, "ldflags", "target.ldflags") {
            target.ldflags = flags;
        }
        if let Some(flags) = string_field(table, "public_cflags", "target.public_cflags") {
            target.public_cflags = flags;
        }
        if let Some(flags) = string_field(table, "public_ldflags", "target.public_ldflags") {
            target.public_ldflags = flags;
        }
        if let Some(cxx) = bool_field(table, "cxx", "target.cxx") {
            target.cxx = cxx;
        }

        target
    }
}

fn parse_dependencies(deps: &toml::Table, root: &Path) -> Vec<Dependency> {
    let mut list = Vec::new();

    for (i, (key, entry)) in deps.iter().enumerate() {
        match entry {
            // dep = { path = "/path/to/dep" }
            toml::Value::Table(table) => match Dependency::from_table(key, table, root) {
                Ok(dep) => list.push(dep),
                Err(e) => warn!("couldn't parse dependency `{}` at index {}: {}", key, i, e),
            },

            // dep = "gh:fmtlib/fmt"
            toml::Value::String(s) => {
                let dep = Dependency::from_str_value(key, s);
                trace!(
                    "dependency: value = `{}`, location = `{}`, pin = `{:?}`",
                    dep.value(),
                    dep.location(),
                    dep.pin()
                );
                list.push(dep);
            }

            other => warn!(
                "dependency `{}` at index {} is of type `{}`, expected `string` or `table`",
                key,
                i,
                other.type_str()
            ),
        }
    }

    list
}

impl Manifest {
    /// Load a manifest from a file path. The package root is the
    /// containing directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = crate::util::fs::read_to_string(path)?;
        let root = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Self::parse(&content, &root)
    }

    /// Parse manifest content against a package root.
    pub fn parse(content: &str, root: &Path) -> Result<Self> {
        let table: toml::Table =
            toml::from_str(content).with_context(|| "failed to parse Qobs.toml")?;

        let package = PackageSection::parse(table.get("package"))?;
        let target = TargetSection::parse(table.get("target"));

        let dependencies = match table.get("dependencies") {
            None => Vec::new(),
            Some(toml::Value::Table(deps)) => parse_dependencies(deps, root),
            Some(other) => {
                warn!(
                    "`dependencies` is of type `{}`, expected `table`",
                    other.type_str()
                );
                Vec::new()
            }
        };

        debug!(
            "manifest parsed: package `{}`, {} dependenc(ies), sources: [{}] (package root: `{}`)",
            package.name,
            dependencies.len(),
            target.sources.join(", "),
            root.display()
        );

        Ok(Manifest {
            package,
            target,
            dependencies,
            root: root.to_path_buf(),
        })
    }

    /// The platform-appropriate name of this package's build artifact.
    pub fn artifact_name(&self) -> String {
        match self.package.kind {
            PackageKind::App => {
                if cfg!(windows) {
                    format!("{}.exe", self.package.name)
                } else {
                    self.package.name.clone()
                }
            }
            PackageKind::Lib => {
                if cfg!(windows) {
                    format!("{}.lib", self.package.name)
                } else {
                    format!("lib{}.a", self.package.name)
                }
            }
        }
    }

    /// Whether a dependency with this name or raw value is already
    /// declared.
    pub fn has_dependency(&self, name: &str, raw_value: &str) -> bool {
        self.dependencies
            .iter()
            .any(|dep| dep.name() == name || dep.value() == raw_value)
    }

    /// Serialize back to TOML text.
    ///
    /// Sections and fields are emitted in a fixed order and defaults are
    /// omitted, so saving a freshly parsed manifest is byte-idempotent.
    pub fn to_toml_string(&self) -> String {
        let mut doc = DocumentMut::new();

        let mut package = Table::new();
        package.insert("name", value(self.package.name.as_str()));
        if !self.package.description.is_empty() {
            package.insert("description", value(self.package.description.as_str()));
        }
        if self.package.kind == PackageKind::Lib {
            package.insert("type", value("lib"));
        }
        if !self.package.authors.is_empty() {
            package.insert(
                "authors",
                value(Array::from_iter(self.package.authors.iter().map(|s| s.as_str()))),
            );
        }
        if self.package.kind == PackageKind::Lib && !self.package.public_include_dirs.is_empty() {
            package.insert(
                "public_include_dirs",
                value(Array::from_iter(
                    self.package.public_include_dirs.iter().map(|s| s.as_str()),
                )),
            );
        }
        doc.insert("package", Item::Table(package));

        let mut target = Table::new();
        target.decor_mut().set_prefix("\n");
        if !self.target.glob_recurse {
            target.insert("glob_recurse", value(false));
        }
        target.insert(
            "sources",
            value(Array::from_iter(self.target.sources.iter().map(|s| s.as_str()))),
        );
        if !self.target.cflags.is_empty() {
            target.insert("cflags", value(self.target.cflags.as_str()));
        }
        if !self.target.ldflags.is_empty() {
            target.insert("ldflags", value(self.target.ldflags.as_str()));
        }
        if !self.target.public_cflags.is_empty() {
            target.insert("public_cflags", value(self.target.public_cflags.as_str()));
        }
        if !self.target.public_ldflags.is_empty() {
            target.insert("public_ldflags", value(self.target.public_ldflags.as_str()));
        }
        target.insert("cxx", value(self.target.cxx));
        doc.insert("target", Item::Table(target));

        let mut deps = Table::new();
        deps.decor_mut().set_prefix("\n");
        for dep in &self.dependencies {
            match dep.kind() {
                DependencyKind::LocalPath => {
                    let mut table = InlineTable::new();
                    table.insert("path", dep.value().into());
                    deps.insert(dep.name(), value(table));
                }
                DependencyKind::VersionControl | DependencyKind::ArchiveUrl => {
                    deps.insert(dep.name(), value(dep.value()));
                }
            }
        }
        doc.insert("dependencies", Item::Table(deps));

        doc.to_string()
    }

    /// Write the manifest to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        crate::util::fs::write_string(path, &self.to_toml_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dependency::VersionPin;

    #[test]
    fn test_parse_minimal_manifest() {
        let content = r#"
[package]
name = "hello"

[target]
sources = ["src/*.c"]
"#;
        let manifest = Manifest::parse(content, Path::new("/proj/hello")).unwrap();
        assert_eq!(manifest.package.name, "hello");
        assert_eq!(manifest.package.kind, PackageKind::App);
        assert_eq!(manifest.target.sources, vec!["src/*.c"]);
        assert!(manifest.target.glob_recurse);
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_defaults_without_target_section() {
        let manifest = Manifest::parse("[package]\nname = \"p\"\n", Path::new("/p")).unwrap();
        assert_eq!(
            manifest.target.sources,
            vec!["src/*.cpp", "src/*.cc", "src/*.c"]
        );
        assert!(manifest.target.glob_recurse);
        assert!(!manifest.target.cxx);
        assert_eq!(manifest.target.cflags, "");
    }

    #[test]
    fn test_missing_name_is_fatal() {
        let err = Manifest::parse("[package]\ndescription = \"x\"\n", Path::new("/p")).unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(
            err,
            Error::MissingRequiredField {
                field: "package.name"
            }
        ));
    }

    #[test]
    fn test_tolerant_authors_array() {
        let content = r#"
[package]
name = "p"
authors = ["ok", 42, "also ok"]
"#;
        let manifest = Manifest::parse(content, Path::new("/p")).unwrap();
        assert_eq!(manifest.package.authors, vec!["ok", "also ok"]);
    }

    #[test]
    fn test_invalid_type_defaults_to_app() {
        let content = "[package]\nname = \"p\"\ntype = \"dylib\"\n";
        let manifest = Manifest::parse(content, Path::new("/p")).unwrap();
        assert_eq!(manifest.package.kind, PackageKind::App);
    }

    #[test]
    fn test_wrong_typed_fields_fall_back_to_defaults() {
        let content = r#"
[package]
name = "p"
description = 7

[target]
glob_recurse = "yes"
cflags = 13
cxx = "true"
"#;
        let manifest = Manifest::parse(content, Path::new("/p")).unwrap();
        assert_eq!(manifest.package.description, "");
        assert!(manifest.target.glob_recurse);
        assert_eq!(manifest.target.cflags, "");
        assert!(!manifest.target.cxx);
    }

    #[test]
    fn test_include_dirs_on_app_are_discarded() {
        let content = r#"
[package]
name = "p"
public_include_dirs = ["include"]
"#;
        let manifest = Manifest::parse(content, Path::new("/p")).unwrap();
        assert!(manifest.package.public_include_dirs.is_empty());
    }

    #[test]
    fn test_include_dirs_on_lib_are_kept() {
        let content = r#"
[package]
name = "p"
type = "lib"
public_include_dirs = ["include", "src/api"]
"#;
        let manifest = Manifest::parse(content, Path::new("/p")).unwrap();
        assert_eq!(manifest.package.kind, PackageKind::Lib);
        assert_eq!(
            manifest.package.public_include_dirs,
            vec!["include", "src/api"]
        );
    }

    #[test]
    fn test_dependencies_keep_declaration_order() {
        let content = r#"
[package]
name = "p"

[dependencies]
zeta = "gh:z/zeta"
alpha = "gh:a/alpha"
json = "gh:nlohmann/json@3.11.3"
"#;
        let manifest = Manifest::parse(content, Path::new("/p")).unwrap();
        let names: Vec<&str> = manifest.dependencies.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "json"]);

        let json = &manifest.dependencies[2];
        assert_eq!(json.location(), "https://github.com/nlohmann/json");
        assert_eq!(*json.pin(), VersionPin::Tag("3.11.3".to_string()));
    }

    #[test]
    fn test_malformed_dependency_is_dropped() {
        let content = r#"
[package]
name = "p"

[dependencies]
good = "gh:a/b"
bad = { git = "https://example.com" }
worse = 42
"#;
        let manifest = Manifest::parse(content, Path::new("/p")).unwrap();
        let names: Vec<&str> = manifest.dependencies.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["good"]);
    }

    #[test]
    fn test_path_dependency_resolved_against_root() {
        let content = r#"
[package]
name = "app"

[dependencies]
mylib = { path = "../mylib" }
"#;
        let manifest = Manifest::parse(content, Path::new("/proj/app")).unwrap();
        let dep = &manifest.dependencies[0];
        assert_eq!(dep.kind(), DependencyKind::LocalPath);
        assert_eq!(
            Path::new(dep.location()),
            Path::new("/proj/app").join("../mylib")
        );
    }

    #[test]
    fn test_artifact_names() {
        let app = Manifest::parse("[package]\nname = \"hello\"\n", Path::new("/p")).unwrap();
        let lib =
            Manifest::parse("[package]\nname = \"mylib\"\ntype = \"lib\"\n", Path::new("/p"))
                .unwrap();

        if cfg!(windows) {
            assert_eq!(app.artifact_name(), "hello.exe");
            assert_eq!(lib.artifact_name(), "mylib.lib");
        } else {
            assert_eq!(app.artifact_name(), "hello");
            assert_eq!(lib.artifact_name(), "libmylib.a");
        }
    }

    #[test]
    fn test_save_parse_is_idempotent() {
        let content = r#"
[package]
name = "app"
description = "demo"
authors = ["a", "b"]

[target]
sources = ["src/*.c"]
cflags = "-Wall -O2"

[dependencies]
json = "gh:nlohmann/json@3.11.3"
mylib = { path = "/abs/mylib" }
"#;
        let manifest = Manifest::parse(content, Path::new("/proj/app")).unwrap();
        let first = manifest.to_toml_string();

        let reparsed = Manifest::parse(&first, Path::new("/proj/app")).unwrap();
        let second = reparsed.to_toml_string();

        assert_eq!(first, second);
    }

    #[test]
    fn test_serialized_section_order() {
        let content = r#"
[package]
name = "mylib"
type = "lib"
public_include_dirs = ["include"]

[target]
glob_recurse = false
sources = ["src/*.c"]
public_cflags = "-DMYLIB=1"
"#;
        let manifest = Manifest::parse(content, Path::new("/p")).unwrap();
        let out = manifest.to_toml_string();

        let package_at = out.find("[package]").unwrap();
        let target_at = out.find("[target]").unwrap();
        let deps_at = out.find("[dependencies]").unwrap();
        assert!(package_at < target_at && target_at < deps_at);

        assert!(out.contains("type = \"lib\""));
        assert!(out.contains("glob_recurse = false"));
        assert!(out.contains("public_cflags = \"-DMYLIB=1\""));
        assert!(out.contains("cxx = false"));
        // Defaults are omitted.
        assert!(!out.contains("description"));
        assert!(!out.contains("ldflags = \"\""));
    }

    #[test]
    fn test_has_dependency() {
        let content = r#"
[package]
name = "p"

[dependencies]
json = "gh:nlohmann/json"
"#;
        let manifest = Manifest::parse(content, Path::new("/p")).unwrap();
        assert!(manifest.has_dependency("json", "whatever"));
        assert!(manifest.has_dependency("other", "gh:nlohmann/json"));
        assert!(!manifest.has_dependency("fmt", "gh:fmtlib/fmt"));
    }

    #[test]
    fn test_find_manifest_walks_up() {
        let tmp = tempfile::TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), "[package]\nname = \"x\"\n").unwrap();

        let found = find_manifest(&nested).unwrap();
        assert_eq!(found, tmp.path().join(MANIFEST_NAME));
    }

    #[test]
    fn test_find_manifest_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        // No Qobs.toml anywhere up to the filesystem root of the tempdir;
        // the walk can still find one in an ancestor on exotic setups, so
        // only assert when nothing was found or the hit is outside tmp.
        if let Some(found) = find_manifest(tmp.path()) {
            assert!(!found.starts_with(tmp.path()));
        }
    }
}

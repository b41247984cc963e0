//! The dependency graph.
//!
//! Nodes live in a name-keyed arena and reference each other by package
//! name in both directions, so there is no cyclic ownership to manage.
//! `add_package` admits a package and, recursively, every managed
//! dependency it declares; `resolve` produces the build order.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, error, info, trace, warn};

use crate::core::manifest::{Manifest, MANIFEST_NAME};
use crate::errors::Error;
use crate::sources;

/// Where a package stands in the current build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildState {
    #[default]
    Pending,
    Building,
    Built,
    Failed,
}

/// One package in the graph.
#[derive(Debug)]
pub struct DepNode {
    /// Canonical package name, from the node's own manifest.
    pub name: String,

    /// The package's manifest, rooted at `src_path`.
    pub manifest: Manifest,

    /// Absolute path to the package's sources.
    pub src_path: PathBuf,

    /// Names of packages this one directly depends on.
    pub dependencies_names: Vec<String>,

    /// Names of packages that directly depend on this one.
    pub dependents_names: Vec<String>,

    pub state: BuildState,
}

/// A graph of packages keyed by canonical name.
pub struct DepGraph {
    nodes: BTreeMap<String, DepNode>,

    /// Where fetched dependency sources are placed, e.g.
    /// `{project_build_dir}/_deps`.
    deps_root: PathBuf,
}

impl DepGraph {
    pub fn new(deps_root: impl Into<PathBuf>) -> Self {
        let deps_root = deps_root.into();
        debug!("dependency graph rooted at {}", deps_root.display());
        DepGraph {
            nodes: BTreeMap::new(),
            deps_root,
        }
    }

    /// Admit a package and, recursively, its managed dependencies.
    ///
    /// The first admission of a name wins; later ones are ignored (no
    /// version reconciliation). Dependencies are fetched as they are
    /// encountered. A fetched tree without a manifest is treated as
    /// non-managed and contributes no node; one whose manifest fails to
    /// parse is skipped with a warning.
    pub fn add_package(&mut self, manifest: Manifest, src_path: &Path) -> Result<()> {
        let name = manifest.package.name.clone();
        trace!("adding package `{}` from {}", name, src_path.display());

        if self.nodes.contains_key(&name) {
            // First one wins.
            trace!("package `{}` already in graph, skipping", name);
            return Ok(());
        }

        let mut manifest = manifest;
        manifest.root = src_path.to_path_buf();
        let dependencies = manifest.dependencies.clone();

        self.nodes.insert(
            name.clone(),
            DepNode {
                name: name.clone(),
                manifest,
                src_path: src_path.to_path_buf(),
                dependencies_names: Vec::new(),
                dependents_names: Vec::new(),
                state: BuildState::Pending,
            },
        );

        for dep in &dependencies {
            trace!("processing dependency `{}` of `{}`", dep.name(), name);
            let dep_src = sources::fetch(dep, &self.deps_root)?;

            let dep_manifest_path = dep_src.join(MANIFEST_NAME);
            if !dep_manifest_path.exists() {
                // Non-managed sources can still be consumed through the
                // package's own flags; they just aren't graph nodes.
                trace!(
                    "no {} at {}, treating `{}` as non-managed",
                    MANIFEST_NAME,
                    dep_src.display(),
                    dep.name()
                );
                continue;
            }

            let dep_manifest = match Manifest::load(&dep_manifest_path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(
                        "couldn't parse {} for dependency `{}`: {:#}. Skipping.",
                        MANIFEST_NAME,
                        dep.name(),
                        e
                    );
                    continue;
                }
            };

            // The manifest's own package name is canonical; the key in the
            // parent's [dependencies] section may be an alias.
            let actual = dep_manifest.package.name.clone();
            if dep.name() != actual {
                info!(
                    "dependency alias: declared as `{}` but its {} defines name `{}`. Using `{}`.",
                    dep.name(),
                    MANIFEST_NAME,
                    actual,
                    actual
                );
            }

            self.add_package(dep_manifest, &dep_src)?;

            if self.nodes.contains_key(&actual) {
                if let Some(node) = self.nodes.get_mut(&name) {
                    node.dependencies_names.push(actual.clone());
                }
                if let Some(dep_node) = self.nodes.get_mut(&actual) {
                    dep_node.dependents_names.push(name.clone());
                }
                trace!("linked {} -> {}", name, actual);
            } else {
                warn!("dependency `{}` was not added to the graph, cannot link", actual);
            }
        }

        Ok(())
    }

    /// Topologically sort the graph so every dependency precedes its
    /// dependents. Fails on cycles, naming the offending edge.
    pub fn resolve(&self) -> Result<Vec<String>> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();

        for name in self.nodes.keys() {
            if !visited.contains(name.as_str()) {
                self.visit(name, &mut order, &mut visited, &mut stack)?;
            }
        }

        debug!("build order: [{}]", order.join(", "));
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        order: &mut Vec<String>,
        visited: &mut HashSet<String>,
        stack: &mut HashSet<String>,
    ) -> Result<()> {
        visited.insert(name.to_string());
        stack.insert(name.to_string());

        if let Some(node) = self.nodes.get(name) {
            for dep in &node.dependencies_names {
                if !self.nodes.contains_key(dep) {
                    error!("dependency `{}` of `{}` not found in graph", dep, name);
                    continue;
                }
                if !visited.contains(dep.as_str()) {
                    self.visit(dep, order, visited, stack)?;
                } else if stack.contains(dep.as_str()) {
                    return Err(Error::CircularDependency {
                        from: name.to_string(),
                        to: dep.clone(),
                    }
                    .into());
                }
            }
        }

        stack.remove(name);
        order.push(name.to_string());
        Ok(())
    }

    pub fn node(&self, name: &str) -> Option<&DepNode> {
        self.nodes.get(name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut DepNode> {
        self.nodes.get_mut(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DepNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_package(root: &Path, dir: &str, manifest: &str) -> PathBuf {
        let pkg_dir = root.join(dir);
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(pkg_dir.join(MANIFEST_NAME), manifest).unwrap();
        pkg_dir
    }

    fn graph_for(root: &Path) -> DepGraph {
        DepGraph::new(root.join("build").join("_deps"))
    }

    #[test]
    fn test_single_package() {
        let tmp = TempDir::new().unwrap();
        let app = write_package(tmp.path(), "hello", "[package]\nname = \"hello\"\n");

        let mut graph = graph_for(tmp.path());
        let manifest = Manifest::load(&app.join(MANIFEST_NAME)).unwrap();
        graph.add_package(manifest, &app).unwrap();

        assert_eq!(graph.resolve().unwrap(), vec!["hello"]);
        assert_eq!(graph.node("hello").unwrap().state, BuildState::Pending);
    }

    #[test]
    fn test_path_dependency_builds_before_dependent() {
        let tmp = TempDir::new().unwrap();
        let app = write_package(
            tmp.path(),
            "app",
            "[package]\nname = \"app\"\n\n[dependencies]\nmylib = { path = \"../mylib\" }\n",
        );
        write_package(tmp.path(), "mylib", "[package]\nname = \"mylib\"\ntype = \"lib\"\n");

        let mut graph = graph_for(tmp.path());
        let manifest = Manifest::load(&app.join(MANIFEST_NAME)).unwrap();
        graph.add_package(manifest, &app).unwrap();

        let order = graph.resolve().unwrap();
        assert_eq!(order, vec!["mylib", "app"]);

        let app_node = graph.node("app").unwrap();
        assert_eq!(app_node.dependencies_names, vec!["mylib"]);
        let lib_node = graph.node("mylib").unwrap();
        assert_eq!(lib_node.dependents_names, vec!["app"]);
    }

    #[test]
    fn test_every_dependency_precedes_its_dependents() {
        let tmp = TempDir::new().unwrap();
        let app = write_package(
            tmp.path(),
            "app",
            "[package]\nname = \"app\"\n\n[dependencies]\n\
             libb = { path = \"../libb\" }\nliba = { path = \"../liba\" }\n",
        );
        write_package(
            tmp.path(),
            "liba",
            "[package]\nname = \"liba\"\ntype = \"lib\"\n\n[dependencies]\n\
             libc = { path = \"../libc\" }\n",
        );
        write_package(tmp.path(), "libb", "[package]\nname = \"libb\"\ntype = \"lib\"\n");
        write_package(tmp.path(), "libc", "[package]\nname = \"libc\"\ntype = \"lib\"\n");

        let mut graph = graph_for(tmp.path());
        let manifest = Manifest::load(&app.join(MANIFEST_NAME)).unwrap();
        graph.add_package(manifest, &app).unwrap();

        let order = graph.resolve().unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();

        for node in graph.nodes() {
            for dep in &node.dependencies_names {
                assert!(
                    pos(dep) < pos(&node.name),
                    "{} should precede {} in {:?}",
                    dep,
                    node.name,
                    order
                );
            }
        }

        // Sibling order follows the manifest's declaration order.
        assert_eq!(
            graph.node("app").unwrap().dependencies_names,
            vec!["libb", "liba"]
        );
    }

    #[test]
    fn test_cycle_is_detected() {
        let tmp = TempDir::new().unwrap();
        let a = write_package(
            tmp.path(),
            "a",
            "[package]\nname = \"a\"\n\n[dependencies]\nb = { path = \"../b\" }\n",
        );
        write_package(
            tmp.path(),
            "b",
            "[package]\nname = \"b\"\n\n[dependencies]\na = { path = \"../a\" }\n",
        );

        let mut graph = graph_for(tmp.path());
        let manifest = Manifest::load(&a.join(MANIFEST_NAME)).unwrap();
        graph.add_package(manifest, &a).unwrap();

        let err = graph.resolve().unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        match err {
            Error::CircularDependency { from, to } => {
                assert!(
                    (from == "a" && to == "b") || (from == "b" && to == "a"),
                    "unexpected edge {from} -> {to}"
                );
            }
            other => panic!("expected CircularDependency, got {other}"),
        }
    }

    #[test]
    fn test_alias_uses_canonical_name() {
        let tmp = TempDir::new().unwrap();
        let app = write_package(
            tmp.path(),
            "app",
            "[package]\nname = \"app\"\n\n[dependencies]\nfoo = { path = \"../bar\" }\n",
        );
        write_package(tmp.path(), "bar", "[package]\nname = \"bar\"\ntype = \"lib\"\n");

        let mut graph = graph_for(tmp.path());
        let manifest = Manifest::load(&app.join(MANIFEST_NAME)).unwrap();
        graph.add_package(manifest, &app).unwrap();

        assert!(graph.node("bar").is_some());
        assert!(graph.node("foo").is_none());
        assert_eq!(graph.node("app").unwrap().dependencies_names, vec!["bar"]);
    }

    #[test]
    fn test_non_managed_dependency_is_not_a_node() {
        let tmp = TempDir::new().unwrap();
        let app = write_package(
            tmp.path(),
            "app",
            "[package]\nname = \"app\"\n\n[dependencies]\nraw = { path = \"../raw\" }\n",
        );
        // A plain source tree without Qobs.toml.
        std::fs::create_dir_all(tmp.path().join("raw")).unwrap();

        let mut graph = graph_for(tmp.path());
        let manifest = Manifest::load(&app.join(MANIFEST_NAME)).unwrap();
        graph.add_package(manifest, &app).unwrap();

        assert_eq!(graph.len(), 1);
        assert!(graph.node("app").unwrap().dependencies_names.is_empty());
    }

    #[test]
    fn test_unparsable_dependency_manifest_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let app = write_package(
            tmp.path(),
            "app",
            "[package]\nname = \"app\"\n\n[dependencies]\nbroken = { path = \"../broken\" }\n",
        );
        // Manifest with no package.name.
        write_package(tmp.path(), "broken", "[target]\nsources = [\"src/*.c\"]\n");

        let mut graph = graph_for(tmp.path());
        let manifest = Manifest::load(&app.join(MANIFEST_NAME)).unwrap();
        graph.add_package(manifest, &app).unwrap();

        assert_eq!(graph.len(), 1);
        assert!(graph.node("app").unwrap().dependencies_names.is_empty());
    }

    #[test]
    fn test_first_admission_wins() {
        let tmp = TempDir::new().unwrap();
        let first = write_package(tmp.path(), "first", "[package]\nname = \"pkg\"\n");
        let second = write_package(tmp.path(), "second", "[package]\nname = \"pkg\"\n");

        let mut graph = graph_for(tmp.path());
        graph
            .add_package(Manifest::load(&first.join(MANIFEST_NAME)).unwrap(), &first)
            .unwrap();
        graph
            .add_package(Manifest::load(&second.join(MANIFEST_NAME)).unwrap(), &second)
            .unwrap();

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node("pkg").unwrap().src_path, first);
    }

    #[test]
    fn test_shared_dependency_admitted_once() {
        let tmp = TempDir::new().unwrap();
        let app = write_package(
            tmp.path(),
            "app",
            "[package]\nname = \"app\"\n\n[dependencies]\n\
             liba = { path = \"../liba\" }\nlibb = { path = \"../libb\" }\n",
        );
        write_package(
            tmp.path(),
            "liba",
            "[package]\nname = \"liba\"\ntype = \"lib\"\n\n[dependencies]\n\
             common = { path = \"../common\" }\n",
        );
        write_package(
            tmp.path(),
            "libb",
            "[package]\nname = \"libb\"\ntype = \"lib\"\n\n[dependencies]\n\
             common = { path = \"../common\" }\n",
        );
        write_package(tmp.path(), "common", "[package]\nname = \"common\"\ntype = \"lib\"\n");

        let mut graph = graph_for(tmp.path());
        let manifest = Manifest::load(&app.join(MANIFEST_NAME)).unwrap();
        graph.add_package(manifest, &app).unwrap();

        assert_eq!(graph.len(), 4);
        let common = graph.node("common").unwrap();
        assert_eq!(common.dependents_names, vec!["liba", "libb"]);

        let order = graph.resolve().unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("common") < pos("liba"));
        assert!(pos("common") < pos("libb"));
        assert!(pos("liba") < pos("app"));
    }
}

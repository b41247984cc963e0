//! End-to-end build orchestration.
//!
//! The runner owns the graph and the artifact registry. Packages build
//! strictly in topological order, so every dependency's artifact record
//! is registered before any dependent generates its plan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, trace, warn};

use crate::builder::ninja::{Generator, GeneratorInput};
use crate::builder::scan::scan_sources;
use crate::builder::toolchain::find_compiler;
use crate::builder::Artifact;
use crate::core::graph::{BuildState, DepGraph};
use crate::core::manifest::{Manifest, PackageKind};
use crate::util::fs;

/// Drives the pipeline: graph population, ordering, per-package plan
/// generation and builder invocation.
pub struct BuildRunner {
    /// Absolute project build directory. The root package builds here;
    /// dependencies build under `_deps/{name}-build`.
    build_dir: PathBuf,

    /// Compiler override from the command line, if any.
    compiler_override: Option<String>,

    /// Template used to mint one generator per package.
    generator: Box<dyn Generator>,

    /// Built packages by name.
    artifacts: BTreeMap<String, Artifact>,
}

impl BuildRunner {
    pub fn new(
        build_dir: impl Into<PathBuf>,
        compiler_override: Option<String>,
        generator: Box<dyn Generator>,
    ) -> Self {
        BuildRunner {
            build_dir: build_dir.into(),
            compiler_override,
            generator,
            artifacts: BTreeMap::new(),
        }
    }

    /// Build the root package and everything it depends on. Returns the
    /// root package's artifact path.
    pub fn build(&mut self, manifest: Manifest) -> Result<PathBuf> {
        let root_name = manifest.package.name.clone();
        let root_src = manifest.root.clone();
        info!("building package `{}`", root_name);

        fs::ensure_dir(&self.build_dir)?;

        let mut graph = DepGraph::new(self.build_dir.join("_deps"));
        graph.add_package(manifest, &root_src)?;
        let order = graph.resolve()?;

        for name in &order {
            let is_root = *name == root_name;
            self.build_package(&mut graph, name, is_root)
                .with_context(|| format!("failed to build package `{name}`"))?;
        }

        let artifact = self
            .artifacts
            .get(&root_name)
            .with_context(|| format!("root package `{root_name}` produced no artifact"))?;
        Ok(artifact.path.clone())
    }

    /// Read-only view of everything built so far.
    pub fn artifacts(&self) -> &BTreeMap<String, Artifact> {
        &self.artifacts
    }

    fn build_package(&mut self, graph: &mut DepGraph, name: &str, is_root: bool) -> Result<()> {
        let pkg_build_dir = if is_root {
            self.build_dir.clone()
        } else {
            self.build_dir.join("_deps").join(format!("{name}-build"))
        };
        fs::ensure_dir(&pkg_build_dir)?;
        debug!("building `{}` in {}", name, pkg_build_dir.display());

        let (manifest, src_path, direct_deps) = {
            let node = graph
                .node_mut(name)
                .with_context(|| format!("package `{name}` missing from graph"))?;
            node.state = BuildState::Building;
            (
                node.manifest.clone(),
                node.src_path.clone(),
                node.dependencies_names.clone(),
            )
        };

        let result = self.plan_and_invoke(&manifest, &src_path, &direct_deps, &pkg_build_dir);

        match result {
            Ok(artifact_path) => {
                if let Some(node) = graph.node_mut(name) {
                    node.state = BuildState::Built;
                }
                self.artifacts.insert(
                    name.to_string(),
                    Artifact {
                        path: artifact_path,
                        manifest,
                        src_path,
                    },
                );
                Ok(())
            }
            Err(e) => {
                if let Some(node) = graph.node_mut(name) {
                    node.state = BuildState::Failed;
                }
                Err(e)
            }
        }
    }

    fn plan_and_invoke(
        &mut self,
        manifest: &Manifest,
        src_path: &Path,
        direct_deps: &[String],
        pkg_build_dir: &Path,
    ) -> Result<PathBuf> {
        let files = scan_sources(manifest)?;
        if files.is_empty() && manifest.package.kind == PackageKind::Lib {
            // Header-only libraries are legal; they just archive nothing.
            warn!(
                "library `{}` has no source files (header-only?)",
                manifest.package.name
            );
        }

        let artifact_name = manifest.artifact_name();
        let compiler = find_compiler(manifest.target.cxx, self.compiler_override.as_deref())?;

        let mut generator = self.generator.fresh();
        generator.generate(&GeneratorInput {
            manifest,
            files: &files,
            artifact_name: &artifact_name,
            compiler: &compiler,
            direct_deps,
            artifacts: &self.artifacts,
            src_root: src_path,
        })?;

        let build_file = pkg_build_dir.join("build.ninja");
        fs::write_string(&build_file, generator.code())?;
        trace!("{}:\n{}", build_file.display(), generator.code());

        generator.invoke(&build_file)?;

        Ok(pkg_build_dir.join(artifact_name))
    }
}

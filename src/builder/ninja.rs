//! Build-plan generation for the ninja backend.
//!
//! One generator instance produces the plan for exactly one package. The
//! orchestrator takes a fresh instance per package via
//! [`Generator::fresh`], so no text leaks between packages. Plans are
//! deterministic: identical inputs yield byte-identical text.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::builder::Artifact;
use crate::core::manifest::{Manifest, PackageKind};
use crate::errors::Error;
use crate::util::ProcessBuilder;

/// Everything a generator needs to plan one package.
pub struct GeneratorInput<'a> {
    /// The package being planned.
    pub manifest: &'a Manifest,

    /// Scanned source files, in scan order.
    pub files: &'a [PathBuf],

    /// Platform-appropriate artifact file name.
    pub artifact_name: &'a str,

    /// Compiler invocation name.
    pub compiler: &'a str,

    /// Canonical names of the package's direct managed dependencies, in
    /// declaration order.
    pub direct_deps: &'a [String],

    /// The orchestrator's artifact registry. Packages earlier in the
    /// build order are present; the closure walk resolves transitive
    /// dependencies through it.
    pub artifacts: &'a BTreeMap<String, Artifact>,

    /// The package's source root.
    pub src_root: &'a Path,
}

/// A build-plan generator for one package.
pub trait Generator {
    /// Produce the plan text. Replaces any previously generated text.
    fn generate(&mut self, input: &GeneratorInput<'_>) -> Result<()>;

    /// The generated plan text.
    fn code(&self) -> &str;

    /// Run the downstream builder against a written plan file, in that
    /// file's directory.
    fn invoke(&self, build_file: &Path) -> Result<()>;

    /// A fresh instance with no accumulated state.
    fn fresh(&self) -> Box<dyn Generator>;
}

/// Managed dependencies transitively reachable from `direct`, in a
/// stable breadth-first order. Names that don't resolve in the registry
/// are non-managed (or unmanaged aliases) and are skipped.
fn dependency_closure(direct: &[String], artifacts: &BTreeMap<String, Artifact>) -> Vec<String> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut queue: VecDeque<String> = direct.iter().cloned().collect();

    while let Some(name) = queue.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(artifact) = artifacts.get(&name) else {
            continue;
        };
        for dep in &artifact.manifest.dependencies {
            queue.push_back(dep.name().to_string());
        }
        order.push(name);
    }

    order
}

/// The compile-flag closure: the package's own private cflags, then each
/// reachable dependency's public cflags and `-I` mappings for its public
/// include dirs.
fn compile_flags(
    manifest: &Manifest,
    closure: &[String],
    artifacts: &BTreeMap<String, Artifact>,
) -> Vec<String> {
    let mut flags: Vec<String> = manifest
        .target
        .cflags
        .split_whitespace()
        .map(String::from)
        .collect();

    for name in closure {
        let Some(artifact) = artifacts.get(name) else {
            continue;
        };
        flags.extend(
            artifact
                .manifest
                .target
                .public_cflags
                .split_whitespace()
                .map(String::from),
        );
        if artifact.manifest.package.kind == PackageKind::Lib {
            for dir in &artifact.manifest.package.public_include_dirs {
                flags.push(format!("-I{}", artifact.src_path.join(dir).display()));
            }
        }
    }

    flags
}

/// The link-flag closure: own private ldflags plus the closure's public
/// ldflags.
fn link_flags(
    manifest: &Manifest,
    closure: &[String],
    artifacts: &BTreeMap<String, Artifact>,
) -> Vec<String> {
    let mut flags: Vec<String> = manifest
        .target
        .ldflags
        .split_whitespace()
        .map(String::from)
        .collect();

    for name in closure {
        let Some(artifact) = artifacts.get(name) else {
            continue;
        };
        flags.extend(
            artifact
                .manifest
                .target
                .public_ldflags
                .split_whitespace()
                .map(String::from),
        );
    }

    flags
}

/// Escape a path for use in a ninja build statement.
fn ninja_escape(path: &str) -> String {
    path.replace('$', "$$").replace(':', "$:").replace(' ', "$ ")
}

/// Object file path (relative to the package build directory) for a
/// source file.
fn object_path(src_root: &Path, source: &Path) -> String {
    let relative = match source.strip_prefix(src_root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => PathBuf::from(source.file_name().unwrap_or(source.as_os_str())),
    };
    format!("obj/{}.o", relative.display()).replace('\\', "/")
}

/// Emits `build.ninja` text for one package.
pub struct NinjaGenerator {
    code: String,
    package: String,
}

impl NinjaGenerator {
    pub fn new() -> Self {
        NinjaGenerator {
            code: String::new(),
            package: String::new(),
        }
    }

    fn writeln(&mut self, line: &str) {
        self.code.push_str(line);
        self.code.push('\n');
    }
}

impl Default for NinjaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for NinjaGenerator {
    fn generate(&mut self, input: &GeneratorInput<'_>) -> Result<()> {
        self.code.clear();
        self.package = input.manifest.package.name.clone();

        let is_lib = input.manifest.package.kind == PackageKind::Lib;
        let closure = dependency_closure(input.direct_deps, input.artifacts);
        let cflags = compile_flags(input.manifest, &closure, input.artifacts);
        let ldflags = link_flags(input.manifest, &closure, input.artifacts);

        self.writeln("# generated by qobs, do not edit");
        self.writeln(&format!("cc = {}", input.compiler));
        self.writeln(&format!("cflags = {}", cflags.join(" ")));
        self.writeln(&format!("ldflags = {}", ldflags.join(" ")));
        self.writeln("");
        self.writeln("rule compile");
        self.writeln("  command = $cc $cflags -c $in -o $out");
        self.writeln("  description = CC $out");
        self.writeln("");
        if is_lib {
            self.writeln("rule archive");
            if cfg!(windows) {
                self.writeln("  command = lib /nologo /OUT:$out $in");
            } else {
                self.writeln("  command = ar rcs $out $in");
            }
            self.writeln("  description = AR $out");
        } else {
            self.writeln("rule link");
            self.writeln("  command = $cc $in $ldflags -o $out");
            self.writeln("  description = LINK $out");
        }
        self.writeln("");

        let mut objects = Vec::with_capacity(input.files.len());
        for file in input.files {
            let object = object_path(input.src_root, file);
            self.writeln(&format!(
                "build {}: compile {}",
                ninja_escape(&object),
                ninja_escape(&file.display().to_string())
            ));
            objects.push(object);
        }
        self.writeln("");

        let mut link_inputs: Vec<String> = objects;
        if !is_lib {
            // Applications link every reachable library artifact.
            for name in &closure {
                let Some(artifact) = input.artifacts.get(name) else {
                    continue;
                };
                if artifact.manifest.package.kind == PackageKind::Lib {
                    link_inputs.push(artifact.path.display().to_string());
                }
            }
        }

        let rule = if is_lib { "archive" } else { "link" };
        let escaped_inputs: Vec<String> = link_inputs.iter().map(|p| ninja_escape(p)).collect();
        self.writeln(&format!(
            "build {}: {} {}",
            ninja_escape(input.artifact_name),
            rule,
            escaped_inputs.join(" ")
        ));
        self.writeln("");
        self.writeln(&format!("default {}", ninja_escape(input.artifact_name)));

        Ok(())
    }

    fn code(&self) -> &str {
        &self.code
    }

    fn invoke(&self, build_file: &Path) -> Result<()> {
        let build_dir = build_file.parent().unwrap_or(Path::new("."));
        let process = ProcessBuilder::new("ninja")
            .arg("-f")
            .arg(build_file)
            .cwd(build_dir);
        debug!("invoking: {}", process.display_command());

        let status = process.status()?;
        if !status.success() {
            return Err(Error::BuildInvocationFailed {
                package: self.package.clone(),
                code: status.code().unwrap_or(-1),
            }
            .into());
        }
        Ok(())
    }

    fn fresh(&self) -> Box<dyn Generator> {
        Box::new(NinjaGenerator::new())
    }
}

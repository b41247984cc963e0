//! Build pipeline: source scanning, compiler location, build-plan
//! generation and end-to-end orchestration.

pub mod ninja;
pub mod orchestrator;
pub mod scan;
pub mod toolchain;

use std::path::PathBuf;

use crate::core::manifest::Manifest;

/// A successfully built package: where its artifact landed, plus the
/// manifest and source root its consumers need to derive include paths
/// and flag closures.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Absolute path to the emitted archive or executable.
    pub path: PathBuf,

    /// The package's manifest.
    pub manifest: Manifest,

    /// The package's source root.
    pub src_path: PathBuf,
}

pub use ninja::{Generator, GeneratorInput, NinjaGenerator};
pub use orchestrator::BuildRunner;
pub use scan::scan_sources;
pub use toolchain::find_compiler;

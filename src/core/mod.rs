//! Core data model: manifests, dependency descriptors, and the
//! dependency graph.

pub mod dependency;
pub mod graph;
pub mod manifest;

pub use dependency::{Dependency, DependencyKind, VersionPin};
pub use graph::{BuildState, DepGraph, DepNode};
pub use manifest::{Manifest, PackageKind, PackageSection, TargetSection};

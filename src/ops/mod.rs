//! High-level operations behind the CLI commands.

pub mod qobs_add;
pub mod qobs_build;

pub use qobs_add::{add_dependency, remove_dependency, AddOptions};
pub use qobs_build::{build, BuildOptions};

//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Qobs - a cargo-like build orchestrator for C and C++
#[derive(Parser)]
#[command(name = "qobs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug/info)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a package and its dependencies
    Build(BuildArgs),

    /// Add a dependency to Qobs.toml
    Add(AddArgs),

    /// Remove a dependency from Qobs.toml
    Remove(RemoveArgs),

    /// Remove the build directory
    Clean(CleanArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Path to the package to build (defaults to the current directory)
    pub path: Option<PathBuf>,

    /// Compiler to use instead of auto-detection
    #[arg(short, long)]
    pub compiler: Option<String>,

    /// Build directory (defaults to `build` inside the package root)
    #[arg(long)]
    pub build_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Dependency name
    pub name: String,

    /// Dependency value: URL, git remote or shortcut, with an optional
    /// `#hash` or `@tag` suffix
    pub value: Option<String>,

    /// Path to a local dependency
    #[arg(long, conflicts_with = "value")]
    pub path: Option<String>,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Dependency name to remove
    pub name: String,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Path to the package to clean (defaults to the current directory)
    pub path: Option<PathBuf>,
}

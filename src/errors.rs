//! Error taxonomy for the build pipeline.
//!
//! Tolerant-parse issues (wrong field types, malformed dependency entries)
//! are logged as warnings and never reach this module. Anything that
//! prevents producing a correct build plan is raised as one of these
//! variants and unwinds to the orchestrator through `anyhow` chains.

use thiserror::Error;

/// A fatal error surfaced from the core pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The manifest lacks a required field.
    #[error(
        "`{field}` is required, either define it in Qobs.toml or re-run `qobs new`:\n\
         [package]\nname = \"my-package-name\" # this is required"
    )]
    MissingRequiredField { field: &'static str },

    /// A dependency entry is ill-formed (unknown key, wrong type).
    #[error("bad dependency `{name}`: {reason}")]
    BadDependency { name: String, reason: String },

    /// Dependency acquisition failed.
    #[error("failed to fetch `{name}`: {message}")]
    FetchFailed { name: String, message: String },

    /// A cycle was detected during topological sort.
    #[error("circular dependency detected: `{from}` depends on `{to}`, which is part of the current build stack")]
    CircularDependency { from: String, to: String },

    /// No usable C/C++ compiler was found.
    #[error(
        "couldn't find a suitable C/C++ compiler, either re-run with `--compiler`, \
         set the `CC` or `CXX` environment variable or add your compiler to PATH"
    )]
    NoCompiler,

    /// The downstream builder exited with a non-zero status.
    #[error("ninja exited with status {code} while building `{package}`")]
    BuildInvocationFailed { package: String, code: i32 },
}

//! Qobs - a cargo-like build orchestrator for C and C++
//!
//! This crate provides the core library functionality for Qobs:
//! manifest ingestion, dependency fetching, graph resolution, build-plan
//! generation and invocation of the downstream builder.

pub mod builder;
pub mod core;
pub mod errors;
pub mod ops;
pub mod sources;
pub mod util;

pub use crate::builder::{Artifact, BuildRunner, Generator, NinjaGenerator};
pub use crate::core::{DepGraph, Dependency, Manifest};
pub use crate::errors::Error;

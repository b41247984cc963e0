//! Compiler location.
//!
//! Resolution order: an explicit override, then the `CXX`/`CC`
//! environment variable (depending on which language is requested), then
//! a platform probe list where the first candidate answering
//! `--version` with exit status 0 wins.

use anyhow::Result;
use tracing::{debug, trace};

use crate::errors::Error;
use crate::util::ProcessBuilder;

#[cfg(not(windows))]
const C_COMPILERS: &[&str] = &["clang", "gcc", "icx", "icc", "tcc"];
#[cfg(not(windows))]
const CXX_COMPILERS: &[&str] = &["clang++", "g++", "clang", "gcc", "icpx", "icx", "icpc", "icc"];

#[cfg(windows)]
const C_COMPILERS: &[&str] = &[
    "cl.exe",
    "clang.exe",
    "gcc.exe",
    "icx.exe",
    "icc.exe",
    "tcc.exe",
];
#[cfg(windows)]
const CXX_COMPILERS: &[&str] = &[
    "cl.exe",
    "clang++.exe",
    "g++.exe",
    "clang.exe",
    "gcc.exe",
    "icpx.exe",
    "icx.exe",
    "icpc.exe",
    "icc.exe",
];

/// Resolve the compiler to invoke. `prefer_cxx` selects the C++ probe
/// list and the `CXX` environment variable.
pub fn find_compiler(prefer_cxx: bool, override_compiler: Option<&str>) -> Result<String> {
    if let Some(cc) = override_compiler {
        debug!("using compiler override: {}", cc);
        return Ok(cc.to_string());
    }

    let env_var = if prefer_cxx { "CXX" } else { "CC" };
    if let Ok(cc) = std::env::var(env_var) {
        if !cc.is_empty() {
            debug!("using compiler from ${}: {}", env_var, cc);
            return Ok(cc);
        }
    }

    for candidate in if prefer_cxx { CXX_COMPILERS } else { C_COMPILERS } {
        trace!("trying compiler: {}", candidate);

        if which::which(candidate).is_err() {
            trace!("`{}` not found in PATH", candidate);
            continue;
        }

        match ProcessBuilder::new(candidate).arg("--version").exec() {
            Ok(output) if output.status.success() => {
                debug!("found working compiler: {}", candidate);
                return Ok(candidate.to_string());
            }
            Ok(output) => debug!(
                "compiler(?) `{}` exited with code {:?}",
                candidate,
                output.status.code()
            ),
            Err(e) => trace!("failed to spawn `{}`: {:#}", candidate, e),
        }
    }

    Err(Error::NoCompiler.into())
}

//! Git dependencies: clone with progress, then advance to a pinned ref.
//!
//! libgit2's process-wide setup is performed by the `git2` crate behind a
//! thread-safe one-shot guard, and torn down at process exit.

use std::path::Path;

use anyhow::Result;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{FetchOptions, RemoteCallbacks, Repository, ResetType};
use tracing::{debug, info};

use crate::core::dependency::{Dependency, VersionPin};
use crate::errors::Error;
use crate::util::progress::{styled_bar, SequentialProgress};

/// Clone `dep`'s remote into `dest` and, when the descriptor carries a
/// pin, hard-reset the working tree to it.
///
/// Two sequenced progress bars are reported: object transfer during the
/// fetch, then file counts during checkout.
pub fn clone(dep: &Dependency, dest: &Path) -> Result<()> {
    info!("cloning {}", dep.location());

    let progress = SequentialProgress::new();
    progress.add_bar(styled_bar("fetching"));
    progress.add_bar(styled_bar("checkout"));

    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(|stats| {
        if stats.total_objects() > 0 {
            progress.update(stats.received_objects() as f64 / stats.total_objects() as f64);
        }
        true
    });

    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(callbacks);

    let mut checkout = CheckoutBuilder::new();
    checkout.progress(|_path, completed, total| {
        // Runs after the fetch completed, so this drives the second bar.
        if total > 0 {
            progress.update(completed as f64 / total as f64);
        }
    });

    let repo = RepoBuilder::new()
        .fetch_options(fetch_opts)
        .with_checkout(checkout)
        .clone(dep.location(), dest)
        .map_err(|e| fetch_failed(dep, &e))?;

    checkout_pin(dep, &repo).map_err(|e| fetch_failed(dep, &e))?;

    Ok(())
}

/// Advance the working tree to the descriptor's pin, if any.
fn checkout_pin(dep: &Dependency, repo: &Repository) -> Result<(), git2::Error> {
    match dep.pin() {
        VersionPin::None => Ok(()),
        VersionPin::Commit(hash) => {
            debug!("resetting `{}` to commit {}", dep.name(), hash);
            let object = repo.revparse_single(hash)?;
            repo.reset(&object, ResetType::Hard, None)
        }
        VersionPin::Tag(tag) => {
            debug!("resetting `{}` to tag {}", dep.name(), tag);
            let reference = repo.find_reference(&format!("refs/tags/{tag}"))?;
            let commit = reference.peel_to_commit()?;
            repo.reset(commit.as_object(), ResetType::Hard, None)
        }
    }
}

fn fetch_failed(dep: &Dependency, err: &git2::Error) -> anyhow::Error {
    Error::FetchFailed {
        name: dep.name().to_string(),
        message: format!("{:?}: {}", err.class(), err.message()),
    }
    .into()
}

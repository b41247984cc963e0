//! Archive dependencies: download a gzipped tarball and extract it.
//!
//! Extraction strips a single shared top-level directory when the archive
//! has one (the usual layout of forge-generated tarballs), so a managed
//! package's Qobs.toml ends up at the root of the returned directory.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use tracing::info;

use crate::core::dependency::Dependency;
use crate::errors::Error;

/// Download `dep`'s archive and extract it into `dest`.
pub fn download_and_extract(dep: &Dependency, dest: &Path) -> Result<()> {
    info!("downloading {}", dep.location());

    let bytes = download(dep.location()).map_err(|e| Error::FetchFailed {
        name: dep.name().to_string(),
        message: format!("{e:#}"),
    })?;

    extract_tarball(&bytes, dest).map_err(|e| Error::FetchFailed {
        name: dep.name().to_string(),
        message: format!("{e:#}"),
    })?;

    Ok(())
}

fn download(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("failed to download archive from {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("failed to download archive from {}: HTTP {}", url, response.status());
    }

    let bytes = response
        .bytes()
        .with_context(|| "failed to read archive response body")?;
    Ok(bytes.to_vec())
}

/// Extract a gzipped tarball into `dest`.
pub fn extract_tarball(data: &[u8], dest: &Path) -> Result<()> {
    let strip_root = common_root(data)?;

    let decoder = GzDecoder::new(Cursor::new(data));
    let mut archive = Archive::new(decoder);

    std::fs::create_dir_all(dest)
        .with_context(|| format!("couldn't create directory: {}", dest.display()))?;

    for entry in archive.entries().context("failed to read archive entries")? {
        let mut entry = entry.context("failed to read archive entry")?;
        let entry_path = entry.path().context("failed to get entry path")?.into_owned();

        let relative = match &strip_root {
            Some(root) => match entry_path.strip_prefix(root) {
                Ok(stripped) if stripped.as_os_str().is_empty() => continue,
                Ok(stripped) => stripped.to_path_buf(),
                Err(_) => entry_path.clone(),
            },
            None => entry_path.clone(),
        };

        // Reject entries that would escape the destination.
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            anyhow::bail!("archive entry escapes destination: {}", entry_path.display());
        }

        let output_path = dest.join(&relative);
        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&output_path)
                .with_context(|| format!("couldn't create directory: {}", output_path.display()))?;
        } else {
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("couldn't create directory: {}", parent.display())
                })?;
            }
            entry
                .unpack(&output_path)
                .with_context(|| format!("failed to extract: {}", output_path.display()))?;
        }
    }

    Ok(())
}

/// The single top-level directory shared by every entry, if there is one.
fn common_root(data: &[u8]) -> Result<Option<PathBuf>> {
    let decoder = GzDecoder::new(Cursor::new(data));
    let mut archive = Archive::new(decoder);

    let mut root: Option<PathBuf> = None;
    for entry in archive.entries().context("failed to read archive entries")? {
        let entry = entry.context("failed to read archive entry")?;
        let path = entry.path().context("failed to get entry path")?;

        let Some(Component::Normal(first)) = path.components().next() else {
            return Ok(None);
        };
        let first = PathBuf::from(first);
        match &root {
            None => root = Some(first),
            Some(existing) if *existing == first => {}
            Some(_) => return Ok(None),
        }
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, contents) in entries {
            let mut header = tar::Header::new_gnu();
            let name_bytes = path.as_bytes();
            header.as_old_mut().name[..name_bytes.len()].copy_from_slice(name_bytes);
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, contents.as_bytes()).unwrap();
        }
        let tar_bytes = builder.into_inner().unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_extract_strips_single_root() {
        let data = tarball(&[
            ("json-3.11.3/Qobs.toml", "[package]\nname = \"json\"\n"),
            ("json-3.11.3/src/lib.c", "int x;\n"),
        ]);
        let tmp = TempDir::new().unwrap();

        extract_tarball(&data, tmp.path()).unwrap();
        assert!(tmp.path().join("Qobs.toml").exists());
        assert!(tmp.path().join("src/lib.c").exists());
    }

    #[test]
    fn test_extract_without_shared_root_keeps_layout() {
        let data = tarball(&[("a.txt", "a"), ("dir/b.txt", "b")]);
        let tmp = TempDir::new().unwrap();

        extract_tarball(&data, tmp.path()).unwrap();
        assert!(tmp.path().join("a.txt").exists());
        assert!(tmp.path().join("dir/b.txt").exists());
    }

    #[test]
    fn test_extract_rejects_escaping_entry() {
        let data = tarball(&[("ok.txt", "x"), ("../evil.txt", "y")]);
        let tmp = TempDir::new().unwrap();

        assert!(extract_tarball(&data, tmp.path()).is_err());
    }

}

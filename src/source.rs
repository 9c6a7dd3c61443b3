//! Turns the user's input into a directory the engine can walk
//!
//! Directories are used in place. Zip archives are unpacked into a temporary
//! directory that lives as long as the returned [`PreparedSource`].

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

/// A directory ready for upload
#[derive(Debug)]
pub struct PreparedSource {
    root: PathBuf,
    extracted: Option<TempDir>,
}

impl PreparedSource {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the root lives in a temporary extraction directory
    pub fn is_extracted(&self) -> bool {
        self.extracted.is_some()
    }
}

/// Resolve `path` to an upload root, extracting `.zip` archives
pub async fn prepare_source(path: &Path) -> Result<PreparedSource> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Source not found: {}", path.display()))?;

    if metadata.is_dir() {
        debug!("Using directory {} in place", path.display());
        return Ok(PreparedSource {
            root: path.to_path_buf(),
            extracted: None,
        });
    }

    if !is_zip(path) {
        bail!("Unsupported source {}: expected a directory or a .zip archive", path.display());
    }

    let temp_dir = TempDir::new().context("Failed to create extraction directory")?;
    extract_zip(path, temp_dir.path()).await?;
    let root = single_top_level_dir(temp_dir.path())
        .await?
        .unwrap_or_else(|| temp_dir.path().to_path_buf());

    info!("Extracted {} to {}", path.display(), root.display());

    Ok(PreparedSource {
        root,
        extracted: Some(temp_dir),
    })
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

async fn extract_zip(archive: &Path, destination: &Path) -> Result<()> {
    let output = Command::new("unzip")
        .arg("-q")
        .arg(archive)
        .arg("-d")
        .arg(destination)
        .output()
        .await
        .context("Failed to run unzip. Is it installed?")?;

    if !output.status.success() {
        return Err(anyhow!(
            "Failed to extract {}: {}",
            archive.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(())
}

/// The only entry of `dir` when that entry is a directory
async fn single_top_level_dir(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut found = None;
    while let Some(entry) = entries.next_entry().await? {
        if found.is_some() {
            return Ok(None);
        }
        found = Some(entry);
    }

    match found {
        Some(entry) if entry.file_type().await?.is_dir() => Ok(Some(entry.path())),
        _ => Ok(None),
    }
}

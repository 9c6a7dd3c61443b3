//! Upload planning - turns a directory tree into an ordered list of files
//!
//! The plan is computed once, before any network call, so the total file
//! count is known up front and progress percentages never jump backward.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::SyncError;
use crate::ignore_rules::IgnoreMatcher;

/// A single file selected for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub absolute_path: PathBuf,
    /// Forward-slash separated path relative to the upload root
    pub relative_path: String,
}

/// Ordered, filtered list of files to upload
#[derive(Debug, Clone, Default)]
pub struct UploadPlan {
    entries: Vec<FileEntry>,
    ignore_file: Option<PathBuf>,
    ignored_count: usize,
}

impl UploadPlan {
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ignore file that was honored while building the plan
    pub fn ignore_file(&self) -> Option<&Path> {
        self.ignore_file.as_deref()
    }

    /// Files and directories dropped by ignore rules
    pub fn ignored_count(&self) -> usize {
        self.ignored_count
    }

    pub fn relative_paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.relative_path.as_str())
    }
}

/// Walk `root` and build the upload plan, honoring `ignore_file_name` at the root
pub fn enumerate(root: &Path, ignore_file_name: &str) -> Result<UploadPlan, SyncError> {
    if !root.is_dir() {
        return Err(SyncError::Validation(format!(
            "Upload root is not a directory: {}",
            root.display()
        )));
    }

    let matcher = IgnoreMatcher::load(root, ignore_file_name).map_err(|source| {
        SyncError::Enumeration {
            path: root.join(ignore_file_name),
            source,
        }
    })?;

    enumerate_with(root, &matcher)
}

/// Walk `root` with an already compiled matcher
pub fn enumerate_with(root: &Path, matcher: &IgnoreMatcher) -> Result<UploadPlan, SyncError> {
    let mut entries = Vec::new();
    let mut ignored_files = 0usize;
    let pruned_dirs = Cell::new(0usize);

    // Sorting by name keeps the order stable for a given tree.
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            match relative_path(root, entry.path()) {
                Some(rel) if matcher.matches_dir(&rel) => {
                    debug!("Skipping ignored directory: {}", rel);
                    pruned_dirs.set(pruned_dirs.get() + 1);
                    false
                }
                Some(_) => true,
                None => {
                    warn!("Skipping directory with a non UTF-8 name: {}", entry.path().display());
                    false
                }
            }
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            SyncError::Enumeration {
                path,
                source: e.into(),
            }
        })?;

        let file_type = entry.file_type();
        if !file_type.is_file() {
            if file_type.is_symlink() {
                debug!("Skipping symlink: {}", entry.path().display());
            }
            continue;
        }

        let Some(rel) = relative_path(root, entry.path()) else {
            warn!("Skipping file with a non UTF-8 name: {}", entry.path().display());
            continue;
        };

        if matcher.source().is_some_and(|source| Path::new(&rel) == source) {
            continue;
        }

        if matcher.matches(&rel) {
            debug!("Skipping ignored file: {}", rel);
            ignored_files += 1;
            continue;
        }

        entries.push(FileEntry {
            absolute_path: entry.into_path(),
            relative_path: rel,
        });
    }

    let ignored_count = ignored_files + pruned_dirs.get();
    info!(
        "Planned {} files for upload from {} ({} ignored)",
        entries.len(),
        root.display(),
        ignored_count
    );

    Ok(UploadPlan {
        entries,
        ignore_file: matcher.source().map(Path::to_path_buf),
        ignored_count,
    })
}

/// Relative path with `/` separators
///
/// `None` for the root itself and for names that are not valid UTF-8, which
/// could not be uploaded under their real name.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let segments = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

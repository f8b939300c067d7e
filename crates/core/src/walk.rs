//! Local directory enumeration
//!
//! Walks an upload root and yields every regular file with its object key
//! and size. Symlinked files are followed; symlinked directories are not
//! descended into, which is the walkdir default.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::filter::ExtensionFilter;
use crate::path::{relative_key, resolve_root};
use crate::transfer::CancelFlag;

/// A file discovered during a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// Object key, `/`-separated, starting with the root folder name
    pub relative_key: String,
    /// Size at walk time
    pub size_bytes: u64,
}

/// An entry the walk could not read
#[derive(Debug)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub error: Error,
}

/// Enumerates files under an upload root
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: PathBuf,
    filter: ExtensionFilter,
}

impl DirectoryWalker {
    /// Create a walker, failing with [`Error::Walk`] if `root` is not a directory
    pub fn new(root: &Path, filter: ExtensionFilter) -> Result<Self> {
        let root = resolve_root(root)?;
        Ok(Self { root, filter })
    }

    /// Resolved absolute root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }

    /// Walk the tree
    ///
    /// Every call starts a fresh traversal. Entries that cannot be read are
    /// yielded as errors so the caller can record them and keep going.
    pub fn walk(
        &self,
    ) -> impl Iterator<Item = std::result::Result<LocalFile, SkippedEntry>> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| self.visit(entry))
    }

    /// Walk the tree and split readable files from failures
    ///
    /// Stops with [`Error::Interrupted`] once `cancel` is set.
    pub fn collect(&self, cancel: &CancelFlag) -> Result<(Vec<LocalFile>, Vec<SkippedEntry>)> {
        let mut files = Vec::new();
        let mut errors = Vec::new();
        for item in self.walk() {
            if cancel.is_cancelled() {
                tracing::debug!(files = files.len(), "walk interrupted");
                return Err(Error::Interrupted);
            }
            match item {
                Ok(file) => files.push(file),
                Err(skipped) => {
                    tracing::warn!(
                        path = %skipped.path.display(),
                        error = %skipped.error,
                        "skipping unreadable entry"
                    );
                    errors.push(skipped);
                }
            }
        }
        tracing::debug!(
            root = %self.root.display(),
            files = files.len(),
            errors = errors.len(),
            "walk finished"
        );
        Ok((files, errors))
    }

    fn visit(
        &self,
        entry: walkdir::Result<walkdir::DirEntry>,
    ) -> Option<std::result::Result<LocalFile, SkippedEntry>> {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(self.root.as_path()).to_path_buf();
                return Some(Err(SkippedEntry {
                    path,
                    error: Error::Io(e.into()),
                }));
            }
        };

        if entry.file_type().is_dir() {
            return None;
        }

        let path = entry.path();
        if self.filter.excludes_name(&entry.file_name().to_string_lossy()) {
            return None;
        }

        // std::fs::metadata follows symlinks, unlike DirEntry::metadata
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                return Some(Err(SkippedEntry {
                    path: path.to_path_buf(),
                    error: Error::Io(e),
                }));
            }
        };
        if !metadata.is_file() {
            return None;
        }

        Some(
            relative_key(&self.root, path)
                .map(|relative_key| LocalFile {
                    absolute_path: path.to_path_buf(),
                    relative_key,
                    size_bytes: metadata.len(),
                })
                .map_err(|error| SkippedEntry {
                    path: path.to_path_buf(),
                    error,
                }),
        )
    }
}

//! Extension-based exclusion shared by `checkfolder` and `upload`

use std::collections::BTreeSet;
use std::path::Path;

/// Set of lowercase extensions, each starting with `.`
///
/// A file is excluded when its lowercased name ends with any entry, so
/// `.tar.gz` works as well as `.gz`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: BTreeSet<String>,
}

impl ExtensionFilter {
    /// Create an empty filter that excludes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from user input such as `["log", ".TMP"]`
    ///
    /// Blank entries are ignored.
    pub fn from_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .filter_map(|ext| normalize(ext.as_ref()))
            .collect();
        Self { extensions }
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Normalized extensions, sorted
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// Whether a file with this name is excluded
    pub fn excludes_name(&self, file_name: &str) -> bool {
        if self.extensions.is_empty() {
            return false;
        }
        let lower = file_name.to_lowercase();
        self.extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
    }

    /// Whether the file at `path` is excluded, judged by its final component
    pub fn excludes(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.excludes_name(&name.to_string_lossy()))
            .unwrap_or(false)
    }
}

fn normalize(ext: &str) -> Option<String> {
    let ext = ext.trim();
    if ext.is_empty() || ext == "." {
        return None;
    }
    let lower = ext.to_lowercase();
    if lower.starts_with('.') {
        Some(lower)
    } else {
        Some(format!(".{lower}"))
    }
}

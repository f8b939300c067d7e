//! Folder size report
//!
//! Sizes the immediate children of a folder. Directories are summed
//! recursively with the same extension filter the sync uses, so the report
//! shows what an upload would actually send.

use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::filter::ExtensionFilter;

/// One row of the size report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeEntry {
    pub name: String,
    pub size_bytes: u64,
}

/// Size every immediate child of `root`, in discovery order
///
/// Filtered files are left out entirely; a directory whose files are all
/// filtered is still listed with size 0. Entries that cannot be read while
/// summing a directory are logged and count as 0 bytes.
pub fn inspect_top(root: &Path, filter: &ExtensionFilter) -> Result<Vec<SizeEntry>> {
    if !root.is_dir() {
        return Err(Error::Walk(format!(
            "{} does not exist or is not a directory",
            root.display()
        )));
    }

    let mut children: Vec<_> = std::fs::read_dir(root)
        .map_err(|e| Error::Walk(format!("cannot read {}: {e}", root.display())))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::Walk(format!("cannot read {}: {e}", root.display())))?;
    children.sort_by_key(|entry| entry.file_name());

    let mut entries = Vec::with_capacity(children.len());
    for child in children {
        let name = child.file_name().to_string_lossy().into_owned();
        let path = child.path();
        // Follows symlinks, like the walker
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if metadata.is_dir() {
            entries.push(SizeEntry {
                name,
                size_bytes: directory_size(&path, filter),
            });
        } else if metadata.is_file() && !filter.excludes_name(&name) {
            entries.push(SizeEntry {
                name,
                size_bytes: metadata.len(),
            });
        }
    }

    tracing::debug!(root = %root.display(), entries = entries.len(), "size report ready");
    Ok(entries)
}

/// Sum of the sizes of every unfiltered file below `dir`
pub fn directory_size(dir: &Path, filter: &ExtensionFilter) -> u64 {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir())
        .filter(|entry| !filter.excludes_name(&entry.file_name().to_string_lossy()))
        .filter_map(|entry| std::fs::metadata(entry.path()).ok())
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
        .sum()
}

/// Largest first; equal sizes keep their order
pub fn sort_by_size_desc(entries: &mut [SizeEntry]) {
    entries.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
}

/// Total of a report
pub fn total_bytes(entries: &[SizeEntry]) -> u64 {
    entries.iter().map(|e| e.size_bytes).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, len: usize) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, vec![0u8; len]).unwrap();
    }

    #[test]
    fn test_logs_and_data_scenario() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(&root.join("logs").join("a.log"), 100);
        write(&root.join("logs").join("b.log"), 150);
        write(&root.join("logs").join("nested").join("c.log"), 50);
        write(&root.join("data").join("d.bin"), 100);

        let mut entries = inspect_top(root, &ExtensionFilter::new()).unwrap();
        sort_by_size_desc(&mut entries);

        assert_eq!(
            entries,
            vec![
                SizeEntry {
                    name: "logs".into(),
                    size_bytes: 300
                },
                SizeEntry {
                    name: "data".into(),
                    size_bytes: 100
                },
            ]
        );
        assert_eq!(total_bytes(&entries), 400);
    }

    #[test]
    fn test_filter_applies_at_every_depth() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(&root.join("logs").join("a.LOG"), 100);
        write(&root.join("logs").join("deep").join("b.log"), 100);
        write(&root.join("logs").join("keep.txt"), 7);
        write(&root.join("top.log"), 9);
        write(&root.join("top.txt"), 3);

        let entries = inspect_top(root, &ExtensionFilter::from_extensions([".log"])).unwrap();

        assert_eq!(
            entries,
            vec![
                SizeEntry {
                    name: "logs".into(),
                    size_bytes: 7
                },
                SizeEntry {
                    name: "top.txt".into(),
                    size_bytes: 3
                },
            ]
        );
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let mut entries = vec![
            SizeEntry {
                name: "a".into(),
                size_bytes: 5,
            },
            SizeEntry {
                name: "b".into(),
                size_bytes: 9,
            },
            SizeEntry {
                name: "c".into(),
                size_bytes: 5,
            },
        ];
        sort_by_size_desc(&mut entries);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_empty_directory_is_listed() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("empty")).unwrap();
        let entries = inspect_top(temp.path(), &ExtensionFilter::new()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size_bytes, 0);
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = inspect_top(&temp.path().join("nope"), &ExtensionFilter::new());
        assert!(matches!(result, Err(Error::Walk(_))));
    }
}

//! Object key derivation
//!
//! Keys are computed relative to the parent of the upload root, so the root
//! folder's own name is always the first segment: uploading
//! `/home/me/project` stores `project/src/main.rs`, wherever the command was
//! run from. Segments are always joined with `/`.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve an upload root to an absolute path with a usable final component
///
/// `.` and relative roots are canonicalized so their real directory name
/// becomes the key prefix.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        return Err(Error::Walk(format!("{} does not exist", root.display())));
    }
    if !root.is_dir() {
        return Err(Error::Walk(format!("{} is not a directory", root.display())));
    }

    let resolved = std::fs::canonicalize(root)
        .map_err(|e| Error::Walk(format!("{}: {e}", root.display())))?;

    if resolved.file_name().is_none() {
        return Err(Error::Walk(format!(
            "{} has no folder name to use as key prefix",
            resolved.display()
        )));
    }

    Ok(resolved)
}

/// Name of the root folder, used as the first key segment
pub fn root_name(root: &Path) -> Result<String> {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Walk(format!("{} has no folder name", root.display())))
}

/// Prefix under which every key of `root` lives (`"<root name>/"`)
pub fn key_prefix(root: &Path) -> Result<String> {
    Ok(format!("{}/", root_name(root)?))
}

/// Object key for `file`, which must live under `root`
pub fn relative_key(root: &Path, file: &Path) -> Result<String> {
    let relative = file.strip_prefix(root).map_err(|_| {
        Error::Walk(format!(
            "{} is not inside {}",
            file.display(),
            root.display()
        ))
    })?;

    let mut key = root_name(root)?;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                key.push('/');
                key.push_str(&part.to_string_lossy());
            }
            Component::CurDir => {}
            other => {
                return Err(Error::Walk(format!(
                    "unexpected path component {other:?} in {}",
                    file.display()
                )));
            }
        }
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relative_key_starts_with_root_name() {
        let root = Path::new("/home/me/project");
        let file = Path::new("/home/me/project/src/main.rs");
        assert_eq!(relative_key(root, file).unwrap(), "project/src/main.rs");
    }

    #[test]
    fn test_relative_key_top_level_file() {
        let root = Path::new("/data/photos");
        let file = Path::new("/data/photos/a.jpg");
        assert_eq!(relative_key(root, file).unwrap(), "photos/a.jpg");
    }

    #[test]
    fn test_relative_key_outside_root() {
        let root = Path::new("/data/photos");
        let file = Path::new("/data/videos/a.mp4");
        assert!(matches!(relative_key(root, file), Err(Error::Walk(_))));
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix(Path::new("/x/project")).unwrap(), "project/");
    }

    #[test]
    fn test_resolve_root_missing() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(matches!(resolve_root(&missing), Err(Error::Walk(_))));
    }

    #[test]
    fn test_resolve_root_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(resolve_root(&file), Err(Error::Walk(_))));
    }

    #[test]
    fn test_resolve_root_relative_components() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        std::fs::create_dir_all(project.join("sub")).unwrap();

        let resolved = resolve_root(&project.join("sub").join("..")).unwrap();
        assert_eq!(root_name(&resolved).unwrap(), "project");
    }
}

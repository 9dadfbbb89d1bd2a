//! Lexical path helpers shared by the store, the explorer, and the tag view.

use std::path::{Component, Path, PathBuf};

/// True when `child` lies strictly inside `parent`. A path is not its own descendant.
/// Both paths are normalized lexically first (no filesystem access).
pub fn is_descendant(parent: &Path, child: &Path) -> bool {
    let parent = normalize(parent);
    let child = normalize(child);
    match child.strip_prefix(&parent) {
        Ok(rest) => !rest.as_os_str().is_empty(),
        Err(_) => false,
    }
}

/// `path` relative to `root`, or `None` when it is outside of it.
pub fn relative_to_root(root: &Path, path: &Path) -> Option<PathBuf> {
    let root = normalize(root);
    let path = normalize(path);
    path.strip_prefix(&root).ok().map(Path::to_path_buf)
}

/// Resolves `.` and `..` without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Last path segment as a display string.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendant_of_parent() {
        assert!(is_descendant(Path::new("/a"), Path::new("/a/b")));
        assert!(is_descendant(Path::new("/a"), Path::new("/a/b/c.md")));
    }

    #[test]
    fn sibling_with_shared_prefix_is_not_descendant() {
        assert!(!is_descendant(Path::new("/a"), Path::new("/ab")));
    }

    #[test]
    fn path_is_not_its_own_descendant() {
        assert!(!is_descendant(Path::new("/a"), Path::new("/a")));
        assert!(!is_descendant(Path::new("/a"), Path::new("/a/")));
    }

    #[test]
    fn dot_dot_escapes_are_resolved() {
        assert!(!is_descendant(Path::new("/a"), Path::new("/a/b/../../c")));
        assert!(is_descendant(Path::new("/a"), Path::new("/a/./b/../c")));
    }

    #[test]
    fn relative_inside_and_outside_root() {
        assert_eq!(
            relative_to_root(Path::new("/notes"), Path::new("/notes/x/y.md")),
            Some(PathBuf::from("x/y.md"))
        );
        assert_eq!(relative_to_root(Path::new("/notes"), Path::new("/other/y.md")), None);
    }
}

//! The file store: every read, write, move, and delete under the notes root goes through here.
//!
//! Each structural change is followed by a [`FileChange`] to observers, and
//! [`FileStore::watch`] turns out-of-band OS events into the same notifications.
//! It also holds the single cut/copy clipboard slot.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecursiveMode, Watcher as _};
use walkdir::WalkDir;

use crate::events::{lock, ChangeKind, Emitter, FileChange, Subscription};
use crate::naming::{self, NamingScheme};
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    File,
    Directory,
    SymbolicLink,
    Unknown,
}

impl FileKind {
    fn of(file_type: fs::FileType) -> Self {
        if file_type.is_file() {
            FileKind::File
        } else if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_symlink() {
            FileKind::SymbolicLink
        } else {
            FileKind::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::File => "File",
            FileKind::Directory => "Directory",
            FileKind::SymbolicLink => "SymbolicLink",
            FileKind::Unknown => "Unknown",
        }
    }
}

/// A filesystem object under the root. Rebuilt from listings; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub kind: FileKind,
}

impl Entry {
    pub fn new(path: impl Into<PathBuf>, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn name(&self) -> String {
        paths::display_name(&self.path)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// Directories first; then by name ignoring case, with case as the tie-breaker.
pub fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    match (a.is_dir(), b.is_dir()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => {
            let (an, bn) = (a.name(), b.name());
            an.to_lowercase()
                .cmp(&bn.to_lowercase())
                .then_with(|| an.cmp(&bn))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub kind: FileKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub created: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub create: bool,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    pub recursive: bool,
}

/// Pending cut/copy selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSlot {
    pub paths: Vec<PathBuf>,
    pub is_cut: bool,
}

pub struct FileStore {
    clipboard: Mutex<Option<ClipboardSlot>>,
    changes: Emitter<FileChange>,
}

impl FileStore {
    pub fn new() -> Self {
        Self {
            clipboard: Mutex::new(None),
            changes: Emitter::new(),
        }
    }

    pub fn on_change(&self, callback: impl Fn(&FileChange) + Send + Sync + 'static) -> Subscription {
        self.changes.subscribe(callback)
    }

    /// Never fails; broken symlinks count as existing.
    pub fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    pub fn stat(&self, path: &Path) -> Result<FileStat, StoreError> {
        let meta = fs::metadata(path).map_err(|e| StoreError::from_io(e, path))?;
        Ok(FileStat {
            kind: FileKind::of(meta.file_type()),
            size: meta.len(),
            modified: meta.modified().ok(),
            created: meta.created().ok(),
        })
    }

    /// Lists `dir`, sorted with [`compare_entries`].
    pub fn list(&self, dir: &Path) -> Result<Vec<Entry>, StoreError> {
        let meta = fs::metadata(dir).map_err(|e| StoreError::from_io(e, dir))?;
        if !meta.is_dir() {
            return Err(StoreError::NotADirectory(dir.to_path_buf()));
        }
        let mut entries = Vec::new();
        for dirent in fs::read_dir(dir).map_err(|e| StoreError::from_io(e, dir))? {
            let dirent = dirent.map_err(|e| StoreError::from_io(e, dir))?;
            let kind = dirent
                .file_type()
                .map(FileKind::of)
                .unwrap_or(FileKind::Unknown);
            entries.push(Entry::new(dirent.path(), kind));
        }
        entries.sort_by(compare_entries);
        Ok(entries)
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        fs::read(path).map_err(|e| StoreError::from_io(e, path))
    }

    pub fn write(&self, path: &Path, content: &[u8], options: WriteOptions) -> Result<(), StoreError> {
        let existed = self.exists(path);
        if existed {
            if !options.overwrite {
                return Err(StoreError::AlreadyExists(path.to_path_buf()));
            }
        } else {
            if !options.create {
                return Err(StoreError::NotFound(path.to_path_buf()));
            }
            self.ensure_parent(path)?;
        }
        fs::write(path, content).map_err(|e| StoreError::from_io(e, path))?;
        let kind = if existed {
            ChangeKind::Changed
        } else {
            ChangeKind::Created
        };
        self.changes.emit(&FileChange::new(path, kind));
        Ok(())
    }

    /// Recursive and idempotent.
    pub fn mkdir(&self, path: &Path) -> Result<(), StoreError> {
        let existed = path.is_dir();
        fs::create_dir_all(path).map_err(|e| StoreError::from_io(e, path))?;
        if !existed {
            self.changes.emit(&FileChange::new(path, ChangeKind::Created));
        }
        Ok(())
    }

    pub fn delete(&self, path: &Path, options: DeleteOptions) -> Result<(), StoreError> {
        self.remove(path, options.recursive)?;
        self.changes.emit(&FileChange::new(path, ChangeKind::Deleted));
        Ok(())
    }

    pub fn rename(&self, old: &Path, new: &Path, overwrite: bool) -> Result<(), StoreError> {
        if !self.exists(old) {
            return Err(StoreError::NotFound(old.to_path_buf()));
        }
        if check_overwrite(old, new, overwrite)? {
            return Ok(());
        }
        self.clear_target(new, overwrite)?;
        self.ensure_parent(new)?;
        fs::rename(old, new).map_err(|e| StoreError::from_io(e, old))?;
        self.emit_moved(old, new);
        Ok(())
    }

    /// Like [`rename`](Self::rename), but refuses to move a directory into itself and
    /// falls back to copy-then-delete when the OS cannot rename (e.g. across devices).
    pub fn move_to(&self, source: &Path, destination: &Path, overwrite: bool) -> Result<(), StoreError> {
        guard_self_containment(source, destination)?;
        if !self.exists(source) {
            return Err(StoreError::NotFound(source.to_path_buf()));
        }
        if check_overwrite(source, destination, overwrite)? {
            return Ok(());
        }
        self.clear_target(destination, overwrite)?;
        self.ensure_parent(destination)?;
        if let Err(e) = fs::rename(source, destination) {
            tracing::debug!(
                source = %source.display(),
                destination = %destination.display(),
                "rename failed ({e}), copying instead"
            );
            copy_recursive(source, destination).map_err(|_| StoreError::from_io(e, source))?;
            self.remove(source, true)?;
        }
        self.emit_moved(source, destination);
        Ok(())
    }

    /// Copies a file, or a directory recursively.
    pub fn copy(&self, source: &Path, destination: &Path, overwrite: bool) -> Result<(), StoreError> {
        guard_self_containment(source, destination)?;
        if !self.exists(source) {
            return Err(StoreError::NotFound(source.to_path_buf()));
        }
        if check_overwrite(source, destination, overwrite)? {
            return Ok(());
        }
        self.clear_target(destination, overwrite)?;
        self.ensure_parent(destination)?;
        copy_recursive(source, destination).map_err(|e| StoreError::from_io(e, destination))?;
        self.changes.emit(&FileChange::new(destination, ChangeKind::Created));
        Ok(())
    }

    /// Creates an empty file named `base`, `base (1)`, … inside `dir`.
    pub fn create_unique_file(&self, dir: &Path, base: &str) -> Result<PathBuf, StoreError> {
        let path = self.free_path(dir, base, NamingScheme::Create)?;
        self.write(&path, &[], WriteOptions { create: true, overwrite: false })?;
        Ok(path)
    }

    /// Creates a directory named `base`, `base (1)`, … inside `dir`.
    pub fn create_unique_dir(&self, dir: &Path, base: &str) -> Result<PathBuf, StoreError> {
        let path = self.free_path(dir, base, NamingScheme::Create)?;
        self.mkdir(&path)?;
        Ok(path)
    }

    /// Pastes `source` into `dest_dir` under a free `name copy` variant, moving it when `cut`.
    pub fn paste_entry(&self, source: &Path, dest_dir: &Path, cut: bool) -> Result<PathBuf, StoreError> {
        let name = paths::display_name(source);
        let keep_extension = !source.is_dir();
        let destination = self.free_path(dest_dir, &name, NamingScheme::Paste { keep_extension })?;
        guard_self_containment(source, &destination)?;
        if cut {
            self.move_to(source, &destination, false)?;
        } else {
            self.copy(source, &destination, false)?;
        }
        Ok(destination)
    }

    pub fn set_clipboard(&self, paths: Vec<PathBuf>, is_cut: bool) {
        *lock(&self.clipboard) = if paths.is_empty() {
            None
        } else {
            Some(ClipboardSlot { paths, is_cut })
        };
    }

    pub fn clear_clipboard(&self) {
        *lock(&self.clipboard) = None;
    }

    pub fn clipboard(&self) -> Option<ClipboardSlot> {
        lock(&self.clipboard).clone()
    }

    /// Starts a recursive OS watch on `root`. Events stop when the returned subscription is dropped.
    pub fn watch(&self, root: &Path) -> Result<Subscription, StoreError> {
        let changes = self.changes.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for path in &event.paths {
                    if let Some(kind) = classify(&event.kind, path) {
                        tracing::debug!(path = %path.display(), ?kind, "watch event");
                        changes.emit(&FileChange::new(path.clone(), kind));
                    }
                }
            }
            Err(e) => tracing::warn!("watch error: {e}"),
        })
        .map_err(|e| StoreError::Watch(e.to_string()))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| StoreError::Watch(e.to_string()))?;
        tracing::debug!(root = %root.display(), "watching");

        let root = root.to_path_buf();
        Ok(Subscription::from_fn(move || {
            tracing::debug!(root = %root.display(), "watch disposed");
            drop(watcher);
        }))
    }

    fn free_path(&self, dir: &Path, name: &str, scheme: NamingScheme) -> Result<PathBuf, StoreError> {
        naming::free_path(dir, name, scheme, |p| self.exists(p)).ok_or_else(|| {
            StoreError::CreationLimitExceeded {
                dir: dir.to_path_buf(),
                name: name.to_string(),
            }
        })
    }

    fn clear_target(&self, target: &Path, overwrite: bool) -> Result<(), StoreError> {
        if !self.exists(target) {
            return Ok(());
        }
        if !overwrite {
            return Err(StoreError::AlreadyExists(target.to_path_buf()));
        }
        self.remove(target, true)
    }

    fn ensure_parent(&self, path: &Path) -> Result<(), StoreError> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                fs::create_dir_all(parent).map_err(|e| StoreError::from_io(e, parent))
            }
            _ => Ok(()),
        }
    }

    fn remove(&self, path: &Path, recursive: bool) -> Result<(), StoreError> {
        let meta = fs::symlink_metadata(path).map_err(|e| StoreError::from_io(e, path))?;
        let result = if meta.is_dir() {
            if recursive {
                fs::remove_dir_all(path)
            } else {
                let mut children = fs::read_dir(path).map_err(|e| StoreError::from_io(e, path))?;
                if children.next().is_some() {
                    return Err(StoreError::IsADirectory(path.to_path_buf()));
                }
                fs::remove_dir(path)
            }
        } else {
            fs::remove_file(path)
        };
        result.map_err(|e| StoreError::from_io(e, path))
    }

    fn emit_moved(&self, from: &Path, to: &Path) {
        self.changes.emit(&FileChange::new(from, ChangeKind::Deleted));
        self.changes.emit(&FileChange::new(to, ChangeKind::Created));
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Refuses to put `source` inside itself.
fn guard_self_containment(source: &Path, destination: &Path) -> Result<(), StoreError> {
    if paths::is_descendant(source, destination) {
        return Err(StoreError::SelfContainment {
            entry: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }
    Ok(())
}

/// Overwriting never removes the source: replacing an entry with itself is a
/// no-op (`Ok(true)`), replacing one of its ancestors is refused.
fn check_overwrite(source: &Path, destination: &Path, overwrite: bool) -> Result<bool, StoreError> {
    if !overwrite {
        return Ok(false);
    }
    if paths::normalize(source) == paths::normalize(destination) {
        return Ok(true);
    }
    if paths::is_descendant(destination, source) {
        return Err(StoreError::ReplacesAncestor {
            entry: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }
    Ok(false)
}

/// One notification kind per OS event, decided by whether the path is still there.
/// Access events are not changes.
fn classify(kind: &EventKind, path: &Path) -> Option<ChangeKind> {
    let exists = fs::symlink_metadata(path).is_ok();
    match kind {
        EventKind::Access(_) => None,
        // inotify also sends the `From` and `To` halves separately.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => None,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
            Some(if exists {
                ChangeKind::Created
            } else {
                ChangeKind::Deleted
            })
        }
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(if exists {
            ChangeKind::Changed
        } else {
            ChangeKind::Deleted
        }),
    }
}

/// Create-directory-then-copy-file-or-recurse.
fn copy_recursive(source: &Path, destination: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = destination.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(link)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    fs::copy(link, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    fn recorder(store: &FileStore) -> (Arc<Mutex<Vec<FileChange>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = store.on_change(move |c| sink.lock().unwrap().push(c.clone()));
        (seen, sub)
    }

    #[test]
    fn list_sorts_directories_first_then_names() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.md"));
        touch(&dir.path().join("A.md"));
        touch(&dir.path().join("a.md"));
        fs::create_dir(dir.path().join("zeta")).unwrap();
        fs::create_dir(dir.path().join("Alpha")).unwrap();

        let store = FileStore::new();
        let names: Vec<String> = store.list(dir.path()).unwrap().iter().map(Entry::name).collect();
        assert_eq!(names, ["Alpha", "zeta", "A.md", "a.md", "b.md"]);
    }

    #[test]
    fn list_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.md");
        touch(&file);
        let store = FileStore::new();
        assert!(matches!(store.list(&dir.path().join("missing")), Err(StoreError::NotFound(_))));
        assert!(matches!(store.list(&file), Err(StoreError::NotADirectory(_))));
    }

    #[test]
    fn write_respects_create_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let p = dir.path().join("nested/deeper/note.md");

        let err = store
            .write(&p, b"x", WriteOptions { create: false, overwrite: true })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        store.write(&p, b"x", WriteOptions { create: true, overwrite: false }).unwrap();
        assert_eq!(store.read(&p).unwrap(), b"x");

        let err = store
            .write(&p, b"y", WriteOptions { create: true, overwrite: false })
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        store.write(&p, b"y", WriteOptions { create: false, overwrite: true }).unwrap();
        assert_eq!(store.read(&p).unwrap(), b"y");
    }

    #[test]
    fn structural_changes_notify() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let (seen, _sub) = recorder(&store);
        let p = dir.path().join("n.md");
        store.write(&p, b"1", WriteOptions { create: true, overwrite: false }).unwrap();
        store.write(&p, b"2", WriteOptions { create: false, overwrite: true }).unwrap();
        store.delete(&p, DeleteOptions::default()).unwrap();

        let kinds: Vec<ChangeKind> = seen.lock().unwrap().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, [ChangeKind::Created, ChangeKind::Changed, ChangeKind::Deleted]);
    }

    #[test]
    fn mkdir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let p = dir.path().join("a/b/c");
        store.mkdir(&p).unwrap();
        store.mkdir(&p).unwrap();
        assert!(p.is_dir());
    }

    #[test]
    fn non_recursive_delete_of_full_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        touch(&sub.join("x.md"));

        let err = store.delete(&sub, DeleteOptions { recursive: false }).unwrap_err();
        assert!(matches!(err, StoreError::IsADirectory(_)));
        store.delete(&sub, DeleteOptions { recursive: true }).unwrap();
        assert!(!sub.exists());
    }

    #[test]
    fn rename_conflicts_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        fs::write(&a, "A").unwrap();
        fs::write(&b, "B").unwrap();

        assert!(matches!(store.rename(&a, &b, false), Err(StoreError::AlreadyExists(_))));
        store.rename(&a, &b, true).unwrap();
        assert!(!a.exists());
        assert_eq!(fs::read_to_string(&b).unwrap(), "A");

        let moved = dir.path().join("new/parent/b.md");
        store.rename(&b, &moved, false).unwrap();
        assert!(moved.is_file());
    }

    #[test]
    fn overwriting_an_entry_with_itself_keeps_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let a = dir.path().join("a.md");
        fs::write(&a, "A").unwrap();

        store.rename(&a, &a, true).unwrap();
        store.move_to(&a, &dir.path().join(".").join("a.md"), true).unwrap();
        store.copy(&a, &a, true).unwrap();
        assert_eq!(fs::read_to_string(&a).unwrap(), "A");
        assert!(matches!(store.rename(&a, &a, false), Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn overwriting_an_ancestor_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let parent = dir.path().join("p");
        let child = parent.join("child");
        fs::create_dir_all(&child).unwrap();
        fs::write(child.join("keep.md"), "k").unwrap();

        assert!(matches!(
            store.move_to(&child, &parent, true),
            Err(StoreError::ReplacesAncestor { .. })
        ));
        assert!(matches!(store.rename(&child, &parent, true), Err(StoreError::ReplacesAncestor { .. })));
        assert!(matches!(store.copy(&child, &parent, true), Err(StoreError::ReplacesAncestor { .. })));
        assert_eq!(fs::read_to_string(child.join("keep.md")).unwrap(), "k");
    }

    #[test]
    fn rename_of_missing_source_leaves_target() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let target = dir.path().join("target.md");
        fs::write(&target, "t").unwrap();

        let err = store.rename(&dir.path().join("gone.md"), &target, true).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(fs::read_to_string(&target).unwrap(), "t");
    }

    #[test]
    fn copy_directory_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("inner/empty")).unwrap();
        fs::write(src.join("inner/a.md"), "a").unwrap();
        fs::write(src.join("top.md"), "t").unwrap();

        let dst = dir.path().join("dst");
        store.copy(&src, &dst, false).unwrap();
        assert_eq!(fs::read_to_string(dst.join("inner/a.md")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dst.join("top.md")).unwrap(), "t");
        assert!(dst.join("inner/empty").is_dir());
        assert!(src.join("top.md").exists());

        assert!(matches!(store.copy(&src, &dst, false), Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn moving_directory_into_itself_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let a = dir.path().join("a");
        fs::create_dir(&a).unwrap();
        touch(&a.join("keep.md"));

        let err = store.move_to(&a, &a.join("b"), false).unwrap_err();
        assert!(matches!(err, StoreError::SelfContainment { .. }));
        assert!(a.join("keep.md").is_file());
        assert!(!a.join("b").exists());
    }

    #[test]
    fn creation_limit_after_hundred_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        for _ in 0..100 {
            store.create_unique_file(dir.path(), "New file").unwrap();
        }
        assert!(dir.path().join("New file (99)").is_file());

        let err = store.create_unique_file(dir.path(), "New file").unwrap_err();
        assert!(matches!(err, StoreError::CreationLimitExceeded { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 100);
    }

    #[test]
    fn unique_folder_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let first = store.create_unique_dir(dir.path(), "New folder").unwrap();
        let second = store.create_unique_dir(dir.path(), "New folder").unwrap();
        assert_eq!(first, dir.path().join("New folder"));
        assert_eq!(second, dir.path().join("New folder (1)"));
    }

    #[test]
    fn paste_copy_into_own_parent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let note = dir.path().join("note.md");
        fs::write(&note, "body").unwrap();

        let first = store.paste_entry(&note, dir.path(), false).unwrap();
        assert_eq!(first, dir.path().join("note copy.md"));
        let second = store.paste_entry(&note, dir.path(), false).unwrap();
        assert_eq!(second, dir.path().join("note copy2.md"));
        assert_eq!(fs::read_to_string(second).unwrap(), "body");
    }

    #[test]
    fn paste_directory_into_its_child_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new();
        let a = dir.path().join("a");
        fs::create_dir_all(a.join("b")).unwrap();

        let err = store.paste_entry(&a, &a.join("b"), true).unwrap_err();
        assert!(matches!(err, StoreError::SelfContainment { .. }));
        assert!(a.join("b").is_dir());
    }

    #[test]
    fn clipboard_last_write_wins() {
        let store = FileStore::new();
        assert!(store.clipboard().is_none());
        store.set_clipboard(vec![PathBuf::from("/x")], true);
        store.set_clipboard(vec![PathBuf::from("/y")], false);
        let slot = store.clipboard().unwrap();
        assert_eq!(slot.paths, [PathBuf::from("/y")]);
        assert!(!slot.is_cut);
        store.set_clipboard(Vec::new(), true);
        assert!(store.clipboard().is_none());
    }

    fn wait_for(rx: &mpsc::Receiver<FileChange>, path: &Path, kind: ChangeKind) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut hits = 0;
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left.min(Duration::from_millis(500))) {
                Ok(change) if change.path == path && change.kind == kind => hits += 1,
                Ok(_) => {}
                Err(_) if hits > 0 => break,
                Err(_) => {}
            }
        }
        hits
    }

    /// Everything that arrives until the watch has been quiet for a moment.
    fn drain(rx: &mpsc::Receiver<FileChange>) -> Vec<FileChange> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left.min(Duration::from_millis(700))) {
                Ok(change) => seen.push(change),
                Err(_) if !seen.is_empty() => break,
                Err(_) => {}
            }
        }
        seen
    }

    #[test]
    fn watch_reports_external_rename_once_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let old = root.join("old.md");
        let new = root.join("new.md");
        fs::write(&old, "x").unwrap();

        let store = FileStore::new();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let _sub = store.on_change(move |c| {
            let _ = tx.lock().unwrap().send(c.clone());
        });
        let _watch = store.watch(&root).unwrap();

        fs::rename(&old, &new).unwrap();
        let seen = drain(&rx);
        let count = |path: &Path, kind: ChangeKind| {
            seen.iter().filter(|c| c.path == path && c.kind == kind).count()
        };
        assert_eq!(count(&old, ChangeKind::Deleted), 1, "{seen:?}");
        assert_eq!(count(&new, ChangeKind::Created), 1, "{seen:?}");
        assert_eq!(seen.iter().filter(|c| c.path == old).count(), 1);
    }

    #[test]
    fn watch_reports_external_create_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let store = FileStore::new();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let _sub = store.on_change(move |c| {
            let _ = tx.lock().unwrap().send(c.clone());
        });
        let watch = store.watch(&root).unwrap();

        let file = root.join("new.txt");
        fs::File::create(&file).unwrap();
        assert_eq!(wait_for(&rx, &file, ChangeKind::Created), 1);

        fs::remove_file(&file).unwrap();
        assert_eq!(wait_for(&rx, &file, ChangeKind::Deleted), 1);

        watch.cancel();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(PathBuf),
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),
    #[error("is a directory: {0}")]
    IsADirectory(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("permission denied: {0}")]
    NoPermission(PathBuf),
    #[error("\"{name}\" has reached the creation limit in {dir}; delete some of those entries")]
    CreationLimitExceeded { dir: PathBuf, name: String },
    #[error("cannot put \"{entry}\" into a subdirectory of itself, \"{destination}\"")]
    SelfContainment { entry: PathBuf, destination: PathBuf },
    #[error("cannot replace \"{destination}\" with \"{entry}\", which is inside it")]
    ReplacesAncestor { entry: PathBuf, destination: PathBuf },
    #[error("clipboard is empty")]
    ClipboardEmpty,
    #[error("watch failed: {0}")]
    Watch(String),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Maps OS errors onto the store's error kinds; anything else passes through as `Io`.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path),
            io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path),
            io::ErrorKind::PermissionDenied => StoreError::NoPermission(path),
            io::ErrorKind::IsADirectory | io::ErrorKind::DirectoryNotEmpty => {
                StoreError::IsADirectory(path)
            }
            io::ErrorKind::NotADirectory => StoreError::NotADirectory(path),
            _ => StoreError::Io { path, source: err },
        }
    }
}

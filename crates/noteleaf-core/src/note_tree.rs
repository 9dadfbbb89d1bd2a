//! The note tree: the notes root presented as a lazily expanded tree of entries.
//!
//! Listings are never cached; every expansion reads the directory again.

use std::path::Path;
use std::sync::Arc;

use crate::events::{Emitter, Subscription};
use crate::paths;
use crate::settings::{ConfigItem, Settings};
use crate::store::{Entry, FileKind, FileStore, StoreError};

/// What a tree view needs to render a row, independent of the row's type.
pub trait TreeItem {
    fn label(&self) -> String;
    fn tooltip(&self) -> String;
    fn is_expandable(&self) -> bool;
}

impl TreeItem for Entry {
    fn label(&self) -> String {
        self.name()
    }

    fn tooltip(&self) -> String {
        self.name()
    }

    fn is_expandable(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// Signal that a tree view should re-query its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh;

pub struct NoteTree {
    store: Arc<FileStore>,
    settings: Arc<Settings>,
    refreshes: Emitter<Refresh>,
    _subscriptions: Vec<Subscription>,
}

impl NoteTree {
    pub fn new(store: Arc<FileStore>, settings: Arc<Settings>) -> Self {
        let refreshes = Emitter::new();
        let on_file = {
            let refreshes = refreshes.clone();
            store.on_change(move |_| refreshes.emit(&Refresh))
        };
        let on_config = {
            let refreshes = refreshes.clone();
            settings.on_change(move |change| {
                if change.touches_any(&[ConfigItem::NotesDir, ConfigItem::DisplayMode]) {
                    refreshes.emit(&Refresh);
                }
            })
        };
        Self {
            store,
            settings,
            refreshes,
            _subscriptions: vec![on_file, on_config],
        }
    }

    pub fn on_refresh(&self, callback: impl Fn(&Refresh) + Send + Sync + 'static) -> Subscription {
        self.refreshes.subscribe(callback)
    }

    /// Manual refresh (the "refresh" command).
    pub fn refresh(&self) {
        self.refreshes.emit(&Refresh);
    }

    /// Children of `parent`, or of the root when `None`.
    ///
    /// A root that vanished is reported once and cleared from the settings, so
    /// the next call sees "no root" instead of the same error.
    pub fn children(&self, parent: Option<&Entry>) -> Result<Vec<Entry>, NoteTreeError> {
        let Some(root) = self.settings.notes_dir() else {
            return Ok(Vec::new());
        };
        if !self.store.exists(&root) {
            if let Err(e) = self.settings.set_notes_dir(None) {
                tracing::warn!("could not clear stale notes root: {e}");
            }
            return Err(NoteTreeError::RootMissing(root));
        }
        let dir = parent.map(|p| p.path.as_path()).unwrap_or(root.as_path());
        Ok(self.store.list(dir)?)
    }

    /// The root as an entry, used when a command has no selection.
    pub fn root_entry(&self) -> Option<Entry> {
        self.settings
            .notes_dir()
            .map(|root| Entry::new(root, FileKind::Directory))
    }

    /// Label relative to the root, used by the tag view for file leaves.
    pub fn relative_label(root: &Path, path: &Path) -> String {
        paths::relative_to_root(root, path)
            .map(|rel| rel.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::{DisplayMode, RootConfig};
    use crate::store::WriteOptions;

    fn tree_at(root: Option<&Path>) -> (Arc<FileStore>, Arc<Settings>, NoteTree) {
        let store = Arc::new(FileStore::new());
        let settings = Arc::new(Settings::new(RootConfig {
            notes_dir: root.map(Path::to_path_buf),
            ..RootConfig::default()
        }));
        let tree = NoteTree::new(Arc::clone(&store), Arc::clone(&settings));
        (store, settings, tree)
    }

    #[test]
    fn no_root_no_children() {
        let (_, _, tree) = tree_at(None);
        assert!(tree.children(None).unwrap().is_empty());
    }

    #[test]
    fn lists_root_then_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("journal")).unwrap();
        fs::write(dir.path().join("journal/2024.md"), "").unwrap();
        fs::write(dir.path().join("inbox.md"), "").unwrap();
        let (_, _, tree) = tree_at(Some(dir.path()));

        let top = tree.children(None).unwrap();
        let labels: Vec<String> = top.iter().map(TreeItem::label).collect();
        assert_eq!(labels, ["journal", "inbox.md"]);
        assert!(top[0].is_expandable());
        assert!(!top[1].is_expandable());

        let inner = tree.children(Some(&top[0])).unwrap();
        assert_eq!(inner[0].label(), "2024.md");
    }

    #[test]
    fn listing_is_never_stale() {
        let dir = tempfile::tempdir().unwrap();
        let (_, _, tree) = tree_at(Some(dir.path()));
        assert!(tree.children(None).unwrap().is_empty());
        fs::write(dir.path().join("late.md"), "").unwrap();
        assert_eq!(tree.children(None).unwrap().len(), 1);
    }

    #[test]
    fn vanished_root_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        let (_, settings, tree) = tree_at(Some(&gone));
        assert!(matches!(tree.children(None), Err(NoteTreeError::RootMissing(_))));
        assert!(settings.notes_dir().is_none());
        assert!(tree.children(None).unwrap().is_empty());
    }

    #[test]
    fn refresh_fires_on_store_and_relevant_config_changes() {
        let dir = tempfile::tempdir().unwrap();
        let (store, settings, tree) = tree_at(Some(dir.path()));
        let count = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let count = Arc::clone(&count);
            tree.on_refresh(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        store
            .write(&dir.path().join("a.md"), b"", WriteOptions { create: true, overwrite: false })
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        settings.set_display_mode(DisplayMode::View).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        settings.set_confirm_delete(false).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NoteTreeError {
    #[error("notes directory no longer exists: {0}")]
    RootMissing(std::path::PathBuf),
    #[error(transparent)]
    Store(#[from] StoreError),
}

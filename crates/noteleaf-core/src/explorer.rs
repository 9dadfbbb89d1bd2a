//! Commands behind the note explorer: create, clipboard, rename, delete, search in folder.
//!
//! Selections are plain paths. When a command gets no selection it falls back to the notes root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::paths;
use crate::search::{Search, SearchError, SearchHit, SearchQuery, TextSearch};
use crate::settings::Settings;
use crate::store::{DeleteOptions, FileStore, StoreError};

pub const NEW_FILE_NAME: &str = "New file";
pub const NEW_FOLDER_NAME: &str = "New folder";

/// Characters refused in names on any platform, so notes stay portable.
pub const FORBIDDEN_NAME_CHARS: [char; 9] = ['/', '\\', ':', '?', '*', '"', '<', '>', '|'];

/// Outcome of a paste. Entries refused for being pasted into themselves end up in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasteReport {
    pub pasted: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

pub struct NoteExplorer {
    store: Arc<FileStore>,
    settings: Arc<Settings>,
    search: Search,
}

impl NoteExplorer {
    pub fn new(store: Arc<FileStore>, settings: Arc<Settings>, searcher: Arc<dyn TextSearch>) -> Self {
        Self {
            store,
            settings,
            search: Search::new(searcher),
        }
    }

    /// Directory a command acts in: the selection if it is a directory, its parent
    /// if it is a file, the notes root if nothing is selected.
    pub fn target_dir(&self, selection: Option<&Path>) -> Result<PathBuf, ExplorerError> {
        match selection {
            Some(path) if path.is_dir() => Ok(path.to_path_buf()),
            Some(path) => path
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| ExplorerError::NoParent(path.to_path_buf())),
            None => self.settings.notes_dir().ok_or(ExplorerError::NoRoot),
        }
    }

    pub fn new_file(&self, selection: Option<&Path>) -> Result<PathBuf, ExplorerError> {
        let dir = self.target_dir(selection)?;
        let path = self.store.create_unique_file(&dir, NEW_FILE_NAME)?;
        tracing::info!(path = %path.display(), "created file");
        Ok(path)
    }

    pub fn new_folder(&self, selection: Option<&Path>) -> Result<PathBuf, ExplorerError> {
        let dir = self.target_dir(selection)?;
        let path = self.store.create_unique_dir(&dir, NEW_FOLDER_NAME)?;
        tracing::info!(path = %path.display(), "created folder");
        Ok(path)
    }

    /// Search limited to `dir`. `None` means a newer search superseded this one.
    pub fn find_in_folder(&self, dir: &Path, query: &SearchQuery) -> Result<Option<Vec<SearchHit>>, ExplorerError> {
        Ok(self.search.run(dir, query)?)
    }

    /// Search across the whole notes root.
    pub fn find_in_notes(&self, query: &SearchQuery) -> Result<Option<Vec<SearchHit>>, ExplorerError> {
        let root = self.settings.notes_dir().ok_or(ExplorerError::NoRoot)?;
        self.find_in_folder(&root, query)
    }

    pub fn cut(&self, selection: Vec<PathBuf>) {
        self.store.set_clipboard(selection, true);
    }

    pub fn copy(&self, selection: Vec<PathBuf>) {
        self.store.set_clipboard(selection, false);
    }

    /// Pastes the clipboard into the target directory.
    ///
    /// A cut clipboard is emptied once every entry went through; a copied one stays
    /// so it can be pasted again. The first hard error aborts the rest of the batch;
    /// a cut clipboard then keeps only the entries that did not move.
    pub fn paste(&self, target: Option<&Path>) -> Result<PasteReport, ExplorerError> {
        let slot = self.store.clipboard().ok_or(StoreError::ClipboardEmpty)?;
        let dest_dir = self.target_dir(target)?;
        let mut report = PasteReport::default();
        for (i, source) in slot.paths.iter().enumerate() {
            match self.store.paste_entry(source, &dest_dir, slot.is_cut) {
                Ok(path) => report.pasted.push(path),
                Err(StoreError::SelfContainment { entry, .. }) => {
                    tracing::warn!(entry = %entry.display(), "cannot paste a folder into itself");
                    report.skipped.push(entry);
                }
                Err(e) => {
                    if slot.is_cut {
                        // Moved entries leave the slot.
                        let mut remaining = report.skipped.clone();
                        remaining.extend_from_slice(&slot.paths[i..]);
                        self.store.set_clipboard(remaining, true);
                    }
                    return Err(e.into());
                }
            }
        }
        if slot.is_cut {
            self.store.clear_clipboard();
        }
        tracing::info!(pasted = report.pasted.len(), skipped = report.skipped.len(), "paste done");
        Ok(report)
    }

    pub fn copy_path(&self, path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    /// Path relative to the notes root; the full path when it lies outside the root.
    pub fn copy_relative_path(&self, path: &Path) -> String {
        match self.settings.notes_dir() {
            Some(root) => crate::note_tree::NoteTree::relative_label(&root, path),
            None => self.copy_path(path),
        }
    }

    /// Renames in place. The new name must be a single path component and must not exist.
    pub fn rename(&self, path: &Path, new_name: &str) -> Result<PathBuf, ExplorerError> {
        let trimmed = new_name.trim();
        if trimmed.is_empty()
            || trimmed == "."
            || trimmed == ".."
            || trimmed.contains(FORBIDDEN_NAME_CHARS)
        {
            return Err(ExplorerError::InvalidName(new_name.to_string()));
        }
        let parent = path
            .parent()
            .ok_or_else(|| ExplorerError::NoParent(path.to_path_buf()))?;
        let destination = parent.join(trimmed);
        self.store.rename(path, &destination, false)?;
        tracing::info!(from = %paths::display_name(path), to = trimmed, "renamed");
        Ok(destination)
    }

    /// Whether the host should ask before calling [`delete`](Self::delete).
    pub fn needs_confirmation(&self) -> bool {
        self.settings.confirm_delete()
    }

    /// Deletes a file or a whole folder.
    pub fn delete(&self, path: &Path) -> Result<(), ExplorerError> {
        self.store.delete(path, DeleteOptions { recursive: true })?;
        tracing::info!(path = %path.display(), "deleted");
        Ok(())
    }
}


#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    #[error("no notes directory configured")]
    NoRoot,
    #[error("{0} has no parent directory")]
    NoParent(PathBuf),
    #[error("invalid name: {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

//! Keeps the file store's OS watch bound to the configured notes root.

use std::sync::{Arc, Mutex, Weak};

use crate::events::{lock, Subscription};
use crate::settings::{ConfigItem, Settings};
use crate::store::FileStore;

#[derive(Default)]
struct WatchState {
    watch: Option<Subscription>,
    config: Option<Subscription>,
}

/// Re-arms the recursive watch whenever the notes root changes.
/// Built once at startup with the shared store and settings.
pub struct Watcher {
    store: Arc<FileStore>,
    settings: Arc<Settings>,
    state: Arc<Mutex<WatchState>>,
}

impl Watcher {
    pub fn new(store: Arc<FileStore>, settings: Arc<Settings>) -> Self {
        Self {
            store,
            settings,
            state: Arc::new(Mutex::new(WatchState::default())),
        }
    }

    /// Subscribes to root changes and arms the watch for the current root.
    /// Returns whether a watch is active.
    pub fn watch(&self) -> bool {
        let store = Arc::clone(&self.store);
        let settings: Weak<Settings> = Arc::downgrade(&self.settings);
        let state = Arc::clone(&self.state);
        let sub = self.settings.on_change(move |change| {
            if !change.contains(ConfigItem::NotesDir) {
                return;
            }
            if let Some(settings) = settings.upgrade() {
                rearm(&store, &settings, &state);
            }
        });
        // Replacing an older subscription drops it.
        lock(&self.state).config = Some(sub);
        self.update()
    }

    /// Disposes the current watch and arms a new one on the configured root.
    /// Returns `false` when the root is unset or missing (nothing is watched).
    pub fn update(&self) -> bool {
        rearm(&self.store, &self.settings, &self.state)
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.state).watch.is_some()
    }

    pub fn dispose(&self) {
        let mut state = lock(&self.state);
        state.config = None;
        state.watch = None;
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn rearm(store: &FileStore, settings: &Settings, state: &Mutex<WatchState>) -> bool {
    let mut state = lock(state);
    // Old watch goes first; a brief gap or overlap during the swap is fine.
    if let Some(old) = state.watch.take() {
        old.cancel();
    }
    let Some(root) = settings.notes_dir().filter(|root| store.exists(root)) else {
        tracing::debug!("no notes root to watch");
        return false;
    };
    match store.watch(&root) {
        Ok(sub) => {
            state.watch = Some(sub);
            true
        }
        Err(e) => {
            tracing::warn!(root = %root.display(), "could not watch notes root: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RootConfig;

    fn setup(root: Option<std::path::PathBuf>) -> (Arc<FileStore>, Arc<Settings>, Watcher) {
        let store = Arc::new(FileStore::new());
        let settings = Arc::new(Settings::new(RootConfig {
            notes_dir: root,
            ..RootConfig::default()
        }));
        let watcher = Watcher::new(Arc::clone(&store), Arc::clone(&settings));
        (store, settings, watcher)
    }

    #[test]
    fn no_root_means_no_watch() {
        let (_store, _settings, watcher) = setup(None);
        assert!(!watcher.watch());
        assert!(!watcher.is_armed());
    }

    #[test]
    fn missing_root_means_no_watch() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, _settings, watcher) = setup(Some(dir.path().join("gone")));
        assert!(!watcher.watch());
    }

    #[test]
    fn root_changes_rearm() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, settings, watcher) = setup(None);
        assert!(!watcher.watch());

        settings.set_notes_dir(Some(dir.path().to_path_buf())).unwrap();
        assert!(watcher.is_armed());

        settings.set_notes_dir(Some(dir.path().join("missing"))).unwrap();
        assert!(!watcher.is_armed());

        settings.set_notes_dir(Some(dir.path().to_path_buf())).unwrap();
        assert!(watcher.update());
        assert!(watcher.update());
    }

    #[test]
    fn unrelated_changes_leave_watch_alone() {
        let (_store, settings, watcher) = setup(None);
        watcher.watch();
        settings.set_tag_delimiter(".").unwrap();
        assert!(!watcher.is_armed());
    }

    #[test]
    fn dispose_stops_following_settings() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, settings, watcher) = setup(Some(dir.path().to_path_buf()));
        assert!(watcher.watch());
        watcher.dispose();
        assert!(!watcher.is_armed());
        settings.set_notes_dir(Some(dir.path().to_path_buf())).unwrap();
        assert!(!watcher.is_armed());
    }
}

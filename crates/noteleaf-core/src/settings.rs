//! Live configuration shared by every component, with typed change notifications.
//!
//! One `Settings` is built at startup and handed to the store watcher, the note
//! tree, the tag index, and the explorer. Each mutation persists (when a config
//! path is attached) and then broadcasts a [`ConfigChange`] naming what changed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{self, ConfigError, DisplayMode, RootConfig};
use crate::events::{lock, Emitter, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigItem {
    NotesDir,
    TagDelimiter,
    ConfirmDelete,
    DisplayMode,
}

/// The set of items touched by one mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigChange(BTreeSet<ConfigItem>);

impl ConfigChange {
    pub fn of(items: impl IntoIterator<Item = ConfigItem>) -> Self {
        Self(items.into_iter().collect())
    }

    pub fn contains(&self, item: ConfigItem) -> bool {
        self.0.contains(&item)
    }

    pub fn touches_any(&self, items: &[ConfigItem]) -> bool {
        items.iter().any(|item| self.0.contains(item))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = ConfigItem> + '_ {
        self.0.iter().copied()
    }
}

pub struct Settings {
    current: Mutex<RootConfig>,
    persist_to: Option<PathBuf>,
    changes: Emitter<ConfigChange>,
}

impl Settings {
    /// In-memory settings; mutations are not written anywhere.
    pub fn new(config: RootConfig) -> Self {
        Self {
            current: Mutex::new(config),
            persist_to: None,
            changes: Emitter::new(),
        }
    }

    /// Loads `path` (defaults when missing) and writes every mutation back to it.
    pub fn load_from(path: &Path) -> Self {
        Self {
            current: Mutex::new(config::load_config_from(path)),
            persist_to: Some(path.to_path_buf()),
            changes: Emitter::new(),
        }
    }

    /// Settings backed by the config file in the app data directory.
    pub fn load() -> Self {
        match config::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::new(RootConfig::default()),
        }
    }

    pub fn snapshot(&self) -> RootConfig {
        lock(&self.current).clone()
    }

    pub fn notes_dir(&self) -> Option<PathBuf> {
        lock(&self.current).notes_dir.clone()
    }

    pub fn tag_delimiter(&self) -> String {
        lock(&self.current).tag_delimiter.clone()
    }

    pub fn confirm_delete(&self) -> bool {
        lock(&self.current).confirm_delete
    }

    pub fn display_mode(&self) -> DisplayMode {
        lock(&self.current).display_mode
    }

    pub fn set_notes_dir(&self, dir: Option<PathBuf>) -> Result<(), ConfigError> {
        self.mutate(ConfigItem::NotesDir, |c| c.notes_dir = dir)
    }

    pub fn set_tag_delimiter(&self, delimiter: impl Into<String>) -> Result<(), ConfigError> {
        let delimiter = delimiter.into();
        self.mutate(ConfigItem::TagDelimiter, |c| c.tag_delimiter = delimiter)
    }

    pub fn set_confirm_delete(&self, confirm: bool) -> Result<(), ConfigError> {
        self.mutate(ConfigItem::ConfirmDelete, |c| c.confirm_delete = confirm)
    }

    pub fn set_display_mode(&self, mode: DisplayMode) -> Result<(), ConfigError> {
        self.mutate(ConfigItem::DisplayMode, |c| c.display_mode = mode)
    }

    pub fn toggle_display_mode(&self) -> Result<DisplayMode, ConfigError> {
        let mode = self.display_mode().toggled();
        self.set_display_mode(mode)?;
        Ok(mode)
    }

    /// Replaces the whole config (e.g. after the file was edited by hand) and
    /// broadcasts only the items that actually differ.
    pub fn replace(&self, next: RootConfig) -> ConfigChange {
        let change = {
            let mut current = lock(&self.current);
            let change = diff(&current, &next);
            *current = next;
            change
        };
        if !change.is_empty() {
            self.changes.emit(&change);
        }
        change
    }

    /// Re-reads the attached config file.
    pub fn reload(&self) -> ConfigChange {
        match &self.persist_to {
            Some(path) => self.replace(config::load_config_from(path)),
            None => ConfigChange::default(),
        }
    }

    pub fn on_change(&self, callback: impl Fn(&ConfigChange) + Send + Sync + 'static) -> Subscription {
        self.changes.subscribe(callback)
    }

    fn mutate(&self, item: ConfigItem, apply: impl FnOnce(&mut RootConfig)) -> Result<(), ConfigError> {
        let snapshot = {
            let mut current = lock(&self.current);
            apply(&mut current);
            current.clone()
        };
        let saved = match &self.persist_to {
            Some(path) => config::save_config_to(path, &snapshot),
            None => Ok(()),
        };
        // Observers see the new value even when persisting failed.
        self.changes.emit(&ConfigChange::of([item]));
        saved
    }
}

fn diff(a: &RootConfig, b: &RootConfig) -> ConfigChange {
    let mut items = Vec::new();
    if a.notes_dir != b.notes_dir {
        items.push(ConfigItem::NotesDir);
    }
    if a.tag_delimiter != b.tag_delimiter {
        items.push(ConfigItem::TagDelimiter);
    }
    if a.confirm_delete != b.confirm_delete {
        items.push(ConfigItem::ConfirmDelete);
    }
    if a.display_mode != b.display_mode {
        items.push(ConfigItem::DisplayMode);
    }
    ConfigChange::of(items)
}

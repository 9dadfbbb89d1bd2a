//! Persisted config (notes root, tag delimiter, etc.) in the app data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;

const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_TAG_DELIMITER: &str = "/";

/// How notes open from the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Edit,
    View,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Edit => DisplayMode::View,
            DisplayMode::View => DisplayMode::Edit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootConfig {
    /// Path to the user's notes directory (chosen by them).
    pub notes_dir: Option<PathBuf>,
    /// Splits `project/x` into a `project` tag with an `x` child.
    pub tag_delimiter: String,
    /// Ask before deleting from the note tree.
    pub confirm_delete: bool,
    pub display_mode: DisplayMode,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            notes_dir: None,
            tag_delimiter: DEFAULT_TAG_DELIMITER.to_string(),
            confirm_delete: true,
            display_mode: DisplayMode::Edit,
        }
    }
}

/// Location of the config file, if the app data directory can be resolved.
pub fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> RootConfig {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => RootConfig::default(),
    }
}

/// Load config from `path`. Returns default config if missing or invalid.
pub fn load_config_from(path: &Path) -> RootConfig {
    let Ok(s) = std::fs::read_to_string(path) else {
        return RootConfig::default();
    };
    match toml::from_str(&s) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring invalid config: {e}");
            RootConfig::default()
        }
    }
}

/// Save config to the app data directory.
pub fn save_config(config: &RootConfig) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoDataDir)?;
    save_config_to(&path, config)
}

pub fn save_config_to(path: &Path, config: &RootConfig) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

/// Resolve a user-supplied notes root to an absolute directory.
pub fn resolve_notes_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory(path));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.toml"));
        assert_eq!(config, RootConfig::default());
        assert_eq!(config.tag_delimiter, "/");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let config = RootConfig {
            notes_dir: Some(dir.path().to_path_buf()),
            tag_delimiter: ".".to_string(),
            confirm_delete: false,
            display_mode: DisplayMode::View,
        };
        save_config_to(&path, &config).unwrap();
        assert_eq!(load_config_from(&path), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "tag_delimiter = \":\"\n").unwrap();
        let config = load_config_from(&path);
        assert_eq!(config.tag_delimiter, ":");
        assert!(config.notes_dir.is_none());
        assert!(config.confirm_delete);
    }

    #[test]
    fn resolve_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(
            resolve_notes_dir(&file),
            Err(ConfigError::NotADirectory(_))
        ));
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

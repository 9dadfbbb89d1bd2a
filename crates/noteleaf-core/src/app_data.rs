//! The app data directory. It holds one file, `config.toml`: the notes root,
//! tag delimiter, delete confirmation, and display mode.
//!
//! Notes themselves never live here, and neither does the tag index, which is
//! rebuilt in memory on every refresh.

use std::path::PathBuf;

/// Resolves (and creates) the per-user directory for `config.toml`.
/// On Linux: `~/.local/share/noteleaf/`. `None` when there is no home
/// directory or the directory cannot be created.
pub fn app_data_dir() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("app", "Noteleaf", "noteleaf")?;
    let dir = dirs.data_local_dir();
    if let Err(e) = std::fs::create_dir_all(dir) {
        tracing::warn!(dir = %dir.display(), "cannot create app data directory: {e}");
        return None;
    }
    Some(dir.to_path_buf())
}

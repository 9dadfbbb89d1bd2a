//! Conflict-free names for new files, new folders, and pasted entries.
//!
//! Creation probes `base`, `base (1)`, `base (2)`, …; paste probes `stem.ext`,
//! `stem copy.ext`, `stem copy2.ext`, …. Both give up after [`MAX_ATTEMPTS`].

use std::path::{Path, PathBuf};

pub const MAX_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingScheme {
    /// "New file", "New file (1)", …
    Create,
    /// "note.md", "note copy.md", "note copy2.md", …
    Paste { keep_extension: bool },
}

/// The name probed at `attempt` (0-based).
pub fn candidate(name: &str, scheme: NamingScheme, attempt: usize) -> String {
    match scheme {
        NamingScheme::Create => match attempt {
            0 => name.to_string(),
            n => format!("{name} ({n})"),
        },
        NamingScheme::Paste { keep_extension } => {
            let (stem, ext) = if keep_extension {
                split_extension(name)
            } else {
                (name, "")
            };
            match attempt {
                0 => name.to_string(),
                1 => format!("{stem} copy{ext}"),
                n => format!("{stem} copy{n}{ext}"),
            }
        }
    }
}

/// First unused path for `name` inside `dir`, or `None` once every attempt is taken.
pub fn free_path(
    dir: &Path,
    name: &str,
    scheme: NamingScheme,
    exists: impl Fn(&Path) -> bool,
) -> Option<PathBuf> {
    (0..MAX_ATTEMPTS)
        .map(|attempt| dir.join(candidate(name, scheme, attempt)))
        .find(|path| !exists(path))
}

/// `("note", ".md")` for `note.md`. Dotfiles and extensionless names keep everything in the stem.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(i) => name.split_at(i),
    }
}

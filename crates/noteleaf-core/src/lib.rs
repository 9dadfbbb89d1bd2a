//! All backend logic independent of how the app is run (CLI or an editor host).
//!
//! Notes live in a folder the user chooses. Noteleaf stores only its config
//! in its own app data directory (see [app_data]). Shared state is passed
//! around as `Arc<FileStore>` and `Arc<Settings>`; nothing is global.

pub mod app_data;
pub mod config;
pub mod events;
pub mod explorer;
pub mod frontmatter;
pub mod naming;
pub mod note_tree;
pub mod paths;
pub mod search;
pub mod settings;
pub mod store;
pub mod tags;
pub mod watcher;

pub use app_data::app_data_dir;
pub use config::{load_config, resolve_notes_dir, save_config, ConfigError, DisplayMode, RootConfig};
pub use events::{ChangeKind, Emitter, FileChange, Subscription};
pub use explorer::{ExplorerError, NoteExplorer, PasteReport};
pub use frontmatter::{FrontMatter, FrontmatterError};
pub use note_tree::{NoteTree, NoteTreeError, Refresh, TreeItem};
pub use search::{
    RegexSearcher, RipgrepSearcher, Search, SearchError, SearchHit, SearchMatch, SearchQuery, TextSearch,
};
pub use settings::{ConfigChange, ConfigItem, Settings};
pub use store::{Entry, FileKind, FileStore, StoreError};
pub use tags::{TagForest, TagIndex, TagIndexError, TagItem, TagNode, TagTree};
pub use watcher::Watcher;

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "noteleaf-core ready"
}

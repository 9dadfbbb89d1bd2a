//! Tag index: a tag hierarchy built from the `tags` list in each note's front matter.
//!
//! A tag like `project/x` is split on the configured delimiter into the chain
//! `project → x`. Chains sharing a prefix merge into one tree, and every node
//! owns the files tagged with it or with anything more specific below it.
//! The index is rebuilt from a full rescan on every refresh.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use crate::events::{lock, Emitter, Subscription};
use crate::frontmatter::{self, FrontmatterError};
use crate::note_tree::{NoteTree, Refresh, TreeItem};
use crate::search::{SearchError, SearchMatch, SearchQuery, TextSearch};
use crate::settings::{ConfigItem, Settings};
use crate::store::FileStore;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagNode {
    pub label: String,
    pub owners: BTreeSet<PathBuf>,
    pub children: BTreeMap<String, TagNode>,
}

impl TagNode {
    /// One node per segment, each owning `owner`.
    fn chain(segments: &[&str], owner: &Path) -> Option<Self> {
        let (head, rest) = segments.split_first()?;
        let mut node = TagNode {
            label: head.to_string(),
            owners: BTreeSet::from([owner.to_path_buf()]),
            children: BTreeMap::new(),
        };
        if let Some(child) = Self::chain(rest, owner) {
            node.children.insert(child.label.clone(), child);
        }
        Some(node)
    }

    /// Children in display order.
    pub fn sorted_children(&self) -> Vec<&TagNode> {
        let mut children: Vec<&TagNode> = self.children.values().collect();
        children.sort_by(|a, b| compare_labels(&a.label, &b.label));
        children
    }

    pub fn child(&self, label: &str) -> Option<&TagNode> {
        self.children.get(label)
    }
}

/// Same-label siblings merge: owners are unioned and children merged recursively.
fn merge_into(level: &mut BTreeMap<String, TagNode>, node: TagNode) {
    match level.get_mut(&node.label) {
        Some(existing) => {
            existing.owners.extend(node.owners);
            for child in node.children.into_values() {
                merge_into(&mut existing.children, child);
            }
        }
        None => {
            level.insert(node.label.clone(), node);
        }
    }
}

/// Splits a tag on `delimiter`. Empty segments are dropped; an empty delimiter never splits.
pub fn segments<'a>(tag: &'a str, delimiter: &str) -> Vec<&'a str> {
    if delimiter.is_empty() {
        return if tag.is_empty() { Vec::new() } else { vec![tag] };
    }
    tag.split(delimiter).filter(|s| !s.is_empty()).collect()
}

/// Case-insensitive first, case-sensitive as the tie-breaker.
fn compare_labels(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagForest {
    roots: BTreeMap<String, TagNode>,
}

impl TagForest {
    pub fn insert(&mut self, tag: &str, owner: &Path, delimiter: &str) {
        if let Some(chain) = TagNode::chain(&segments(tag, delimiter), owner) {
            merge_into(&mut self.roots, chain);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Top-level tags in display order.
    pub fn roots(&self) -> Vec<&TagNode> {
        let mut roots: Vec<&TagNode> = self.roots.values().collect();
        roots.sort_by(|a, b| compare_labels(&a.label, &b.label));
        roots
    }

    /// Walks `path` (one label per level) from the top.
    pub fn find(&self, path: &[&str]) -> Option<&TagNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get(*first)?;
        for label in rest {
            node = node.children.get(*label)?;
        }
        Some(node)
    }
}

/// A file whose front matter could not be read. The file is left out of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagIssue {
    pub path: PathBuf,
    pub error: FrontmatterError,
}

/// Scans `root` and builds a fresh forest. Only the first tagged block of each file counts.
pub fn build_forest(
    searcher: &dyn TextSearch,
    root: &Path,
    delimiter: &str,
) -> Result<(TagForest, Vec<TagIssue>), TagIndexError> {
    let query = SearchQuery::regex(frontmatter::TAGGED_BLOCK_PATTERN).match_case(true);
    let mut matches: Vec<SearchMatch> = searcher.search(root, &query)?;
    matches.sort_by(|a, b| a.path.cmp(&b.path).then(a.byte_offset.cmp(&b.byte_offset)));
    matches.dedup_by(|later, first| later.path == first.path);

    let mut forest = TagForest::default();
    let mut issues = Vec::new();
    for m in matches {
        match frontmatter::parse(&m.matched_text) {
            Ok(fm) => {
                let Some(tags) = fm.tags() else { continue };
                for tag in tags {
                    forest.insert(&tag, &m.path, delimiter);
                }
            }
            Err(error) => {
                tracing::warn!(path = %m.path.display(), "skipping file: {error}");
                issues.push(TagIssue { path: m.path, error });
            }
        }
    }
    Ok((forest, issues))
}

#[derive(Default)]
struct Indexed {
    forest: TagForest,
    issues: Vec<TagIssue>,
    /// Ticket of the refresh that produced `forest`.
    generation: u64,
}

/// Owns the current tag forest and rebuilds it on demand.
///
/// Every refresh takes a ticket from a monotonically increasing counter; a
/// result is only committed if no newer refresh has committed first.
pub struct TagIndex {
    searcher: Arc<dyn TextSearch>,
    settings: Arc<Settings>,
    indexed: Mutex<Indexed>,
    tickets: AtomicU64,
    stale: Emitter<Refresh>,
    _subscriptions: Vec<Subscription>,
}

impl TagIndex {
    /// The index goes stale (and notifies [`on_stale`](Self::on_stale) observers) on any store
    /// change and on changes to the notes root or tag delimiter.
    pub fn new(searcher: Arc<dyn TextSearch>, store: &FileStore, settings: Arc<Settings>) -> Self {
        let stale = Emitter::new();
        let on_file = {
            let stale = stale.clone();
            store.on_change(move |_| stale.emit(&Refresh))
        };
        let on_config = {
            let stale = stale.clone();
            settings.on_change(move |change| {
                if change.touches_any(&[ConfigItem::NotesDir, ConfigItem::TagDelimiter]) {
                    stale.emit(&Refresh);
                }
            })
        };
        Self {
            searcher,
            settings,
            indexed: Mutex::new(Indexed::default()),
            tickets: AtomicU64::new(0),
            stale,
            _subscriptions: vec![on_file, on_config],
        }
    }

    pub fn on_stale(&self, callback: impl Fn(&Refresh) + Send + Sync + 'static) -> Subscription {
        self.stale.subscribe(callback)
    }

    /// Full rescan. Returns `false` when a newer refresh committed while this one ran.
    pub fn refresh(&self) -> Result<bool, TagIndexError> {
        let ticket = self.next_ticket();
        let built = match self.settings.notes_dir() {
            Some(root) => build_forest(self.searcher.as_ref(), &root, &self.settings.tag_delimiter())?,
            None => (TagForest::default(), Vec::new()),
        };
        Ok(self.commit(ticket, built))
    }

    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, AtomicOrdering::SeqCst) + 1
    }

    fn commit(&self, ticket: u64, (forest, issues): (TagForest, Vec<TagIssue>)) -> bool {
        let mut indexed = lock(&self.indexed);
        if ticket < indexed.generation {
            tracing::debug!(ticket, current = indexed.generation, "dropping superseded tag index");
            return false;
        }
        tracing::debug!(ticket, tags = forest.len(), issues = issues.len(), "tag index refreshed");
        *indexed = Indexed {
            forest,
            issues,
            generation: ticket,
        };
        true
    }

    pub fn forest(&self) -> TagForest {
        lock(&self.indexed).forest.clone()
    }

    pub fn issues(&self) -> Vec<TagIssue> {
        lock(&self.indexed).issues.clone()
    }

    /// Whether the last committed refresh found no tags. Drives the empty-state view.
    pub fn is_empty(&self) -> bool {
        lock(&self.indexed).forest.is_empty()
    }
}

/// A file shown under a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLeaf {
    pub path: PathBuf,
    /// Path relative to the notes root.
    pub label: String,
}

/// A row in the tag view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagItem {
    Tag(TagNode),
    File(FileLeaf),
}

impl TreeItem for TagItem {
    fn label(&self) -> String {
        match self {
            TagItem::Tag(node) => node.label.clone(),
            TagItem::File(leaf) => leaf.label.clone(),
        }
    }

    fn tooltip(&self) -> String {
        match self {
            TagItem::Tag(node) => node.label.clone(),
            TagItem::File(leaf) => crate::paths::display_name(&leaf.path),
        }
    }

    fn is_expandable(&self) -> bool {
        matches!(self, TagItem::Tag(_))
    }
}

/// Presents a [`TagIndex`] the way [`NoteTree`] presents the notes root.
pub struct TagTree {
    index: Arc<TagIndex>,
    settings: Arc<Settings>,
}

impl TagTree {
    pub fn new(index: Arc<TagIndex>, settings: Arc<Settings>) -> Self {
        Self { index, settings }
    }

    /// Top level rescans; deeper levels read the last committed forest.
    /// Tags come first, then the files owning the tag.
    pub fn children(&self, parent: Option<&TagItem>) -> Result<Vec<TagItem>, TagIndexError> {
        match parent {
            None => {
                self.index.refresh()?;
                Ok(self
                    .index
                    .forest()
                    .roots()
                    .into_iter()
                    .map(|node| TagItem::Tag(node.clone()))
                    .collect())
            }
            Some(TagItem::File(_)) => Ok(Vec::new()),
            Some(TagItem::Tag(node)) => {
                let Some(root) = self.settings.notes_dir() else {
                    return Ok(Vec::new());
                };
                let mut items: Vec<TagItem> = node
                    .sorted_children()
                    .into_iter()
                    .map(|child| TagItem::Tag(child.clone()))
                    .collect();
                let mut files: Vec<FileLeaf> = node
                    .owners
                    .iter()
                    .map(|path| FileLeaf {
                        path: path.clone(),
                        label: NoteTree::relative_label(&root, path),
                    })
                    .collect();
                files.sort_by(|a, b| compare_labels(&a.label, &b.label));
                items.extend(files.into_iter().map(TagItem::File));
                Ok(items)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}


#[derive(Debug, thiserror::Error)]
pub enum TagIndexError {
    #[error(transparent)]
    Search(#[from] SearchError),
}

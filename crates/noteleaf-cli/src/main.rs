//! CLI entry point for the noteleaf backend (for dev and testing).
//!
//! Drives the core the way an editor host would: one shared store and settings,
//! commands on top, and a long-running `watch` that mirrors disk changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use noteleaf_core::config::config_path;
use noteleaf_core::store::Entry;
use noteleaf_core::{
    app_data_dir, resolve_notes_dir, status, DisplayMode, FileChange, FileKind, FileStore, NoteExplorer,
    NoteTree, RegexSearcher, RipgrepSearcher, SearchQuery, Settings, TagIndex, TagItem, TagTree, TextSearch,
    TreeItem, Watcher,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "noteleaf")]
#[command(about = "Noteleaf: browse, tag and search a folder of markdown notes")]
struct Cli {
    /// Use this ripgrep binary for searching instead of the built-in matcher.
    #[arg(long, global = true, value_name = "PROGRAM")]
    rg: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status and the active configuration.
    Status,
    /// Show where noteleaf stores its config (app data directory).
    DataDir,
    /// Set the notes directory. Without a path, clears it.
    SetRoot {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// Change settings. Prints the resulting configuration.
    Config {
        /// Separator for nested tags, e.g. "/" turns `project/x` into `project` > `x`.
        #[arg(long)]
        delimiter: Option<String>,
        #[arg(long)]
        confirm_delete: Option<bool>,
        #[arg(long, value_enum)]
        display_mode: Option<ModeArg>,
        /// Flip between edit and view.
        #[arg(long, conflicts_with = "display_mode")]
        toggle_mode: bool,
    },
    /// List a directory of the note tree (the root by default).
    Ls {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// Print the tag tree.
    Tags {
        #[arg(long)]
        json: bool,
    },
    /// Search the notes (or one folder of them).
    Search {
        query: String,
        /// Treat the query as a regular expression.
        #[arg(long)]
        regex: bool,
        #[arg(long)]
        case: bool,
        #[arg(long)]
        word: bool,
        /// Restrict the search to this folder.
        #[arg(long = "in", value_name = "DIR")]
        folder: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Create "New file" (or "New folder") next to the selection.
    New {
        #[arg(long)]
        folder: bool,
        #[arg(value_name = "SELECTION")]
        selection: Option<PathBuf>,
    },
    /// Copy entries into a directory, as copy + paste would.
    Copy {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        #[arg(long, value_name = "DIR")]
        to: Option<PathBuf>,
    },
    /// Move entries into a directory, as cut + paste would.
    Move {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        #[arg(long, value_name = "DIR")]
        to: Option<PathBuf>,
    },
    Rename {
        path: PathBuf,
        name: String,
    },
    /// Delete a file or folder.
    Rm {
        path: PathBuf,
        /// Skip the confirmation requirement from the config.
        #[arg(long, short)]
        yes: bool,
    },
    /// Watch the notes directory and print changes until Ctrl-C.
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Edit,
    View,
}

impl From<ModeArg> for DisplayMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Edit => DisplayMode::Edit,
            ModeArg::View => DisplayMode::View,
        }
    }
}

/// Shared state, built once per run.
struct App {
    store: Arc<FileStore>,
    settings: Arc<Settings>,
    searcher: Arc<dyn TextSearch>,
}

impl App {
    fn new(rg: Option<PathBuf>) -> Self {
        let searcher: Arc<dyn TextSearch> = match rg {
            Some(program) => Arc::new(RipgrepSearcher::new(program)),
            None => Arc::new(RegexSearcher),
        };
        Self {
            store: Arc::new(FileStore::new()),
            settings: Arc::new(Settings::load()),
            searcher,
        }
    }

    fn explorer(&self) -> NoteExplorer {
        NoteExplorer::new(Arc::clone(&self.store), Arc::clone(&self.settings), Arc::clone(&self.searcher))
    }

    fn tag_index(&self) -> Arc<TagIndex> {
        Arc::new(TagIndex::new(Arc::clone(&self.searcher), &self.store, Arc::clone(&self.settings)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let app = App::new(cli.rg);

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("Noteleaf backend");
            println!("  core: {}", status());
            match config_path() {
                Some(p) => println!("  config: {}", p.display()),
                None => println!("  config: (unavailable, using defaults)"),
            }
            print_config(&app.settings)?;
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => bail!("could not determine app data directory"),
        },
        Commands::SetRoot { path } => {
            let dir = path.as_deref().map(resolve_notes_dir).transpose()?;
            app.settings.set_notes_dir(dir)?;
            print_config(&app.settings)?;
        }
        Commands::Config {
            delimiter,
            confirm_delete,
            display_mode,
            toggle_mode,
        } => {
            if let Some(delimiter) = delimiter {
                app.settings.set_tag_delimiter(delimiter)?;
            }
            if let Some(confirm) = confirm_delete {
                app.settings.set_confirm_delete(confirm)?;
            }
            if let Some(mode) = display_mode {
                app.settings.set_display_mode(mode.into())?;
            }
            if toggle_mode {
                app.settings.toggle_display_mode()?;
            }
            print_config(&app.settings)?;
        }
        Commands::Ls { path } => {
            let tree = NoteTree::new(Arc::clone(&app.store), Arc::clone(&app.settings));
            let parent = path.map(|p| Entry::new(p, FileKind::Directory));
            for entry in tree.children(parent.as_ref())? {
                let suffix = if entry.is_expandable() { "/" } else { "" };
                println!("{}{}", entry.label(), suffix);
            }
        }
        Commands::Tags { json } => {
            let tree = TagTree::new(app.tag_index(), Arc::clone(&app.settings));
            let top = tree.children(None)?;
            if tree.is_empty() {
                println!("No tags found. Add a `tags:` list to a note's front matter.");
                return Ok(());
            }
            let views = top
                .iter()
                .map(|item| TagView::build(&tree, item))
                .collect::<anyhow::Result<Vec<_>>>()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                for view in &views {
                    view.print(0);
                }
            }
        }
        Commands::Search {
            query,
            regex,
            case,
            word,
            folder,
            json,
        } => {
            let query = if regex {
                SearchQuery::regex(query)
            } else {
                SearchQuery::literal(query)
            }
            .match_case(case)
            .whole_word(word);
            let explorer = app.explorer();
            let hits = match folder {
                Some(dir) => explorer.find_in_folder(&dir, &query)?,
                None => explorer.find_in_notes(&query)?,
            }
            .unwrap_or_default();
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No matching results");
            } else {
                for hit in hits {
                    println!("{}:{}: {}", hit.path.display(), hit.line + 1, hit.detail);
                }
            }
        }
        Commands::New { folder, selection } => {
            let explorer = app.explorer();
            let path = if folder {
                explorer.new_folder(selection.as_deref())?
            } else {
                explorer.new_file(selection.as_deref())?
            };
            println!("{}", path.display());
        }
        Commands::Copy { sources, to } => paste(&app, sources, to.as_deref(), false)?,
        Commands::Move { sources, to } => paste(&app, sources, to.as_deref(), true)?,
        Commands::Rename { path, name } => {
            let renamed = app.explorer().rename(&path, &name)?;
            println!("{}", renamed.display());
        }
        Commands::Rm { path, yes } => {
            let explorer = app.explorer();
            if explorer.needs_confirmation() && !yes {
                bail!(
                    "refusing to delete {} without --yes (or set --confirm-delete false)",
                    path.display()
                );
            }
            explorer.delete(&path)?;
        }
        Commands::Watch => watch(&app).await?,
    }

    Ok(())
}

fn print_config(settings: &Settings) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&settings.snapshot())?);
    Ok(())
}

fn paste(app: &App, sources: Vec<PathBuf>, to: Option<&Path>, cut: bool) -> anyhow::Result<()> {
    let explorer = app.explorer();
    if cut {
        explorer.cut(sources);
    } else {
        explorer.copy(sources);
    }
    let report = explorer.paste(to)?;
    for path in &report.pasted {
        println!("{}", path.display());
    }
    for path in &report.skipped {
        eprintln!("skipped {}: cannot paste a folder into itself", path.display());
    }
    Ok(())
}

#[derive(Serialize)]
struct TagView {
    label: String,
    files: Vec<String>,
    children: Vec<TagView>,
}

impl TagView {
    fn build(tree: &TagTree, item: &TagItem) -> anyhow::Result<Self> {
        let mut view = TagView {
            label: item.label(),
            files: Vec::new(),
            children: Vec::new(),
        };
        for child in tree.children(Some(item))? {
            match &child {
                TagItem::Tag(_) => view.children.push(TagView::build(tree, &child)?),
                TagItem::File(leaf) => view.files.push(leaf.label.clone()),
            }
        }
        Ok(view)
    }

    fn print(&self, depth: usize) {
        let indent = "  ".repeat(depth);
        println!("{indent}#{} ({})", self.label, self.files.len());
        for child in &self.children {
            child.print(depth + 1);
        }
        for file in &self.files {
            println!("{indent}  {file}");
        }
    }
}

/// Mirrors disk changes until Ctrl-C. Events are printed in arrival order and
/// each one triggers a tag re-index on the blocking pool.
async fn watch(app: &App) -> anyhow::Result<()> {
    let watcher = Watcher::new(Arc::clone(&app.store), Arc::clone(&app.settings));
    if !watcher.watch() {
        bail!("nothing to watch: set an existing notes directory with `noteleaf set-root <PATH>`");
    }
    let root = app.settings.notes_dir().context("notes directory disappeared")?;
    println!("Watching {} (Ctrl-C to stop)", root.display());

    let (tx, mut rx) = mpsc::unbounded_channel::<FileChange>();
    let _forward = app.store.on_change(move |change| {
        let _ = tx.send(change.clone());
    });

    let index = app.tag_index();
    spawn_reindex(Arc::clone(&index));

    loop {
        tokio::select! {
            change = rx.recv() => {
                let Some(change) = change else { break };
                println!("{:?} {}", change.kind, change.path.display());
                spawn_reindex(Arc::clone(&index));
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping.");
                break;
            }
        }
    }
    watcher.dispose();
    Ok(())
}

fn spawn_reindex(index: Arc<TagIndex>) {
    tokio::task::spawn_blocking(move || match index.refresh() {
        Ok(true) => {
            let forest = index.forest();
            tracing::info!(tags = forest.len(), issues = index.issues().len(), "tags re-indexed");
            for issue in index.issues() {
                eprintln!("{}: {}", issue.path.display(), issue.error);
            }
        }
        Ok(false) => {}
        Err(e) => tracing::warn!("tag re-index failed: {e}"),
    });
}

//! Full-text search over the notes root.
//!
//! [`TextSearch`] is the seam: [`RegexSearcher`] scans files in-process,
//! [`RipgrepSearcher`] runs `rg --json` as a child process per request. Both
//! report one [`SearchMatch`] per matching line (or multi-line block), carrying
//! its first submatch.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Literal(String),
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub pattern: Pattern,
    /// Let a regex span lines.
    pub multiline: bool,
    pub match_case: bool,
    pub whole_word: bool,
}

impl SearchQuery {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            pattern: Pattern::Literal(text.into()),
            multiline: false,
            match_case: false,
            whole_word: false,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Pattern::Regex(pattern.into()),
            multiline: true,
            match_case: false,
            whole_word: false,
        }
    }

    pub fn match_case(mut self, yes: bool) -> Self {
        self.match_case = yes;
        self
    }

    pub fn whole_word(mut self, yes: bool) -> Self {
        self.whole_word = yes;
        self
    }

    pub fn multiline(mut self, yes: bool) -> Self {
        self.multiline = yes;
        self
    }

    pub fn text(&self) -> &str {
        match &self.pattern {
            Pattern::Literal(s) | Pattern::Regex(s) => s,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self.pattern, Pattern::Regex(_))
    }

    fn compile(&self) -> Result<Regex, SearchError> {
        let body = match &self.pattern {
            Pattern::Literal(s) => regex::escape(s),
            Pattern::Regex(s) => s.clone(),
        };
        let body = if self.whole_word {
            format!(r"\b(?:{body})\b")
        } else {
            body
        };
        RegexBuilder::new(&body)
            .case_insensitive(!self.match_case)
            .multi_line(true)
            .build()
            .map_err(|e| SearchError::InvalidPattern(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub path: PathBuf,
    pub matched_text: String,
    /// The full line(s) the match sits on.
    pub line_text: String,
    /// 1-based.
    pub line_number: u64,
    /// Byte offset of `line_text` within the file.
    pub byte_offset: u64,
}

pub trait TextSearch: Send + Sync {
    fn search(&self, root: &Path, query: &SearchQuery) -> Result<Vec<SearchMatch>, SearchError>;
}

/// Walks the root with `walkdir` and matches with `regex`. Hidden entries and
/// non-UTF-8 files are skipped.
#[derive(Debug, Clone, Default)]
pub struct RegexSearcher;

impl TextSearch for RegexSearcher {
    fn search(&self, root: &Path, query: &SearchQuery) -> Result<Vec<SearchMatch>, SearchError> {
        if !root.is_dir() {
            return Err(SearchError::RootNotFound(root.to_path_buf()));
        }
        let re = query.compile()?;
        let spans_lines = query.is_regex() && query.multiline;
        let mut matches = Vec::new();
        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("search walk: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(text) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            scan_text(entry.path(), &text, &re, spans_lines, &mut matches);
        }
        Ok(matches)
    }
}

fn scan_text(path: &Path, text: &str, re: &Regex, spans_lines: bool, out: &mut Vec<SearchMatch>) {
    let mut covered_until = 0;
    for m in re.find_iter(text) {
        if m.start() < covered_until || m.as_str().is_empty() {
            continue;
        }
        if !spans_lines && m.as_str().contains('\n') {
            continue;
        }
        let line_start = text[..m.start()].rfind('\n').map_or(0, |i| i + 1);
        let line_end = text[m.end()..]
            .find('\n')
            .map_or(text.len(), |i| m.end() + i + 1);
        covered_until = line_end;
        out.push(SearchMatch {
            path: path.to_path_buf(),
            matched_text: m.as_str().to_string(),
            line_text: text[line_start..line_end].to_string(),
            line_number: text[..line_start].matches('\n').count() as u64 + 1,
            byte_offset: line_start as u64,
        });
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Runs ripgrep once per request and parses its JSON lines.
#[derive(Debug, Clone)]
pub struct RipgrepSearcher {
    program: PathBuf,
}

impl RipgrepSearcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(&self, root: &Path, query: &SearchQuery) -> Vec<String> {
        let mut args = vec!["--json".to_string()];
        match &query.pattern {
            Pattern::Literal(s) => {
                args.push("--fixed-strings".to_string());
                args.push(format!("--regexp={s}"));
            }
            Pattern::Regex(s) => {
                args.push(format!("--regexp={s}"));
                if query.multiline {
                    args.push("--multiline".to_string());
                }
            }
        }
        if !query.match_case {
            args.push("--ignore-case".to_string());
        }
        if query.whole_word {
            args.push("--word-regexp".to_string());
        }
        args.push("--".to_string());
        args.push(root.to_string_lossy().into_owned());
        args
    }
}

impl Default for RipgrepSearcher {
    fn default() -> Self {
        Self::new("rg")
    }
}

impl TextSearch for RipgrepSearcher {
    fn search(&self, root: &Path, query: &SearchQuery) -> Result<Vec<SearchMatch>, SearchError> {
        if !root.is_dir() {
            return Err(SearchError::RootNotFound(root.to_path_buf()));
        }
        let output = Command::new(&self.program)
            .args(self.args(root, query))
            .output()
            .map_err(|e| SearchError::Tool(format!("failed to run {}: {e}", self.program.display())))?;
        match output.status.code() {
            Some(0) => parse_rg_json(&String::from_utf8_lossy(&output.stdout)),
            // Exit code 1 means "no matches".
            Some(1) => Ok(Vec::new()),
            _ => Err(SearchError::Tool(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
        }
    }
}

#[derive(Deserialize)]
struct RgText {
    text: Option<String>,
}

#[derive(Deserialize)]
struct RgSubmatch {
    #[serde(rename = "match")]
    matched: RgText,
}

#[derive(Deserialize)]
struct RgMatch {
    path: RgText,
    lines: RgText,
    line_number: Option<u64>,
    absolute_offset: u64,
    submatches: Vec<RgSubmatch>,
}

fn parse_rg_json(stdout: &str) -> Result<Vec<SearchMatch>, SearchError> {
    let mut matches = Vec::new();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let mut message: serde_json::Value =
            serde_json::from_str(line).map_err(|e| SearchError::Tool(format!("bad rg output: {e}")))?;
        if message.get("type").and_then(|t| t.as_str()) != Some("match") {
            continue;
        }
        let data: RgMatch = serde_json::from_value(message["data"].take())
            .map_err(|e| SearchError::Tool(format!("bad rg match: {e}")))?;
        // Non-UTF-8 paths and lines come back base64-encoded; skip them.
        let (Some(path), Some(line_text)) = (data.path.text, data.lines.text) else {
            continue;
        };
        let matched_text = data
            .submatches
            .into_iter()
            .next()
            .and_then(|s| s.matched.text)
            .unwrap_or_default();
        matches.push(SearchMatch {
            path: PathBuf::from(path),
            matched_text,
            line_text,
            line_number: data.line_number.unwrap_or(0),
            byte_offset: data.absolute_offset,
        });
    }
    Ok(matches)
}

/// One row of an ad-hoc search result, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub path: PathBuf,
    /// 0-based, for editors.
    pub line: u64,
    pub detail: String,
}

/// Ad-hoc searches from the search box. Each call takes a ticket; a call that
/// finishes after a newer one started returns `None` so stale results are dropped.
pub struct Search {
    searcher: Arc<dyn TextSearch>,
    latest: AtomicU64,
}

impl Search {
    pub fn new(searcher: Arc<dyn TextSearch>) -> Self {
        Self {
            searcher,
            latest: AtomicU64::new(0),
        }
    }

    pub fn run(&self, root: &Path, query: &SearchQuery) -> Result<Option<Vec<SearchHit>>, SearchError> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if query.text().is_empty() {
            return Ok(Some(Vec::new()));
        }
        let matches = self.searcher.search(root, query)?;
        if self.latest.load(Ordering::SeqCst) != ticket {
            tracing::debug!(ticket, "dropping superseded search results");
            return Ok(None);
        }
        Ok(Some(to_hits(matches, query.is_regex())))
    }
}

/// Sorted by path. Regex hits show the matched text; literal hits show the line from the match on.
pub fn to_hits(mut matches: Vec<SearchMatch>, regex: bool) -> Vec<SearchHit> {
    matches.sort_by(|a, b| a.path.cmp(&b.path).then(a.line_number.cmp(&b.line_number)));
    matches
        .into_iter()
        .map(|m| {
            let detail = if regex {
                m.matched_text.clone()
            } else {
                tail_from_match(&m.line_text, &m.matched_text)
            };
            SearchHit {
                path: m.path,
                line: m.line_number.saturating_sub(1),
                detail,
            }
        })
        .collect()
}

fn tail_from_match(line: &str, matched: &str) -> String {
    let from = if matched.is_empty() { None } else { line.find(matched) };
    let tail = match from {
        Some(i) => &line[i..],
        None => line,
    };
    tail.lines().next().unwrap_or("").trim_end().to_string()
}


#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search root not found: {0}")]
    RootNotFound(PathBuf),
    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),
    #[error("search tool failed: {0}")]
    Tool(String),
}

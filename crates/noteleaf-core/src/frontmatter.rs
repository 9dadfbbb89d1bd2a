//! YAML front matter: the `---` block at the top of a note.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::{Mapping, Value};

lazy_static! {
    static ref BLOCK_RE: Regex = Regex::new(r"(?s)^\s*---[ \t]*\r?\n(.*?)\r?\n?---").unwrap();
    // Top-level `key:` at column 0. Indented lines belong to nested values.
    static ref TOP_KEY_RE: Regex = Regex::new(r"^([^\s#\-][^:]*?)\s*:(?:\s|$)").unwrap();
}

/// Regex handed to the text-search tool to find blocks that carry tags.
pub const TAGGED_BLOCK_PATTERN: &str = r"---[\s\S]*?tags:[\s\S]*?---";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub values: Mapping,
}

impl FrontMatter {
    /// The `tags` list. A single scalar counts as a one-item list; other shapes yield `None`.
    pub fn tags(&self) -> Option<Vec<String>> {
        match self.values.get("tags")? {
            Value::Sequence(items) => Some(items.iter().filter_map(scalar_string).collect()),
            other => scalar_string(other).map(|tag| vec![tag]),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The text between the opening and closing `---`, if `text` starts with a front-matter block.
pub fn extract_block(text: &str) -> Option<&str> {
    BLOCK_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parses a front-matter block. Accepts either the whole `---`-delimited block
/// or just its inner YAML.
pub fn parse(text: &str) -> Result<FrontMatter, FrontmatterError> {
    let yaml = extract_block(text).unwrap_or(text);
    if yaml.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    check_duplicate_keys(yaml)?;
    let values = match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(m)) => m,
        Ok(Value::Null) => Mapping::new(),
        Ok(_) => return Err(FrontmatterError::Malformed("front matter is not a mapping".to_string())),
        Err(e) => {
            let message = e.to_string();
            if message.contains("duplicate") {
                return Err(FrontmatterError::DuplicateKey(message));
            }
            return Err(FrontmatterError::Malformed(message));
        }
    };
    Ok(FrontMatter { values })
}

fn check_duplicate_keys(yaml: &str) -> Result<(), FrontmatterError> {
    let mut seen = HashSet::new();
    for line in yaml.lines() {
        if let Some(caps) = TOP_KEY_RE.captures(line) {
            let key = caps[1].trim().to_string();
            if !seen.insert(key.clone()) {
                return Err(FrontmatterError::DuplicateKey(key));
            }
        }
    }
    Ok(())
}


#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrontmatterError {
    #[error("duplicated front matter key: {0}")]
    DuplicateKey(String),
    #[error("malformed front matter: {0}")]
    Malformed(String),
}

// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::ingest::types::Source;

/// Where the scheduler gets its source list at the start of every cycle.
pub trait SourceCatalog: Send + Sync {
    fn load(&self) -> Result<Vec<Source>>;
}

/// Fixed list, mostly for tests.
impl SourceCatalog for Vec<Source> {
    fn load(&self) -> Result<Vec<Source>> {
        Ok(self.clone())
    }
}

/// Re-reads a sources file on every cycle so edits apply without a restart.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceCatalog for FileCatalog {
    fn load(&self) -> Result<Vec<Source>> {
        load_sources_from(&self.path)
    }
}

/// Load sources from a plain-text (one per line), TOML (`sources = [..]`)
/// or JSON (array) file. A missing file is an empty list.
pub fn load_sources_from(path: &Path) -> Result<Vec<Source>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(target: "ingest", path = %path.display(), "sources file not found");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading sources from {}", path.display()))
        }
    };
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing sources from {}", path.display()))
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<Source>> {
    let head = s.trim_start();
    match hint_ext {
        "toml" => parse_toml(s),
        "json" => parse_json(s),
        _ if head.starts_with('[') => parse_json(s),
        _ if head.starts_with("sources") && head.contains('=') => parse_toml(s),
        _ => Ok(parse_lines(s)),
    }
}

fn parse_toml(s: &str) -> Result<Vec<Source>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        sources: Vec<String>,
    }
    let v: TomlSources = toml::from_str(s).map_err(|e| anyhow!("invalid TOML sources: {e}"))?;
    Ok(clean_list(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<Source>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

fn parse_lines(s: &str) -> Vec<Source> {
    clean_list(s.lines().filter(|l| !l.trim_start().starts_with('#')))
}

/// Trim, drop a leading '@', skip blanks, dedup keeping first occurrence.
fn clean_list<I, S>(items: I) -> Vec<Source>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for it in items {
        let t = it.as_ref().trim();
        let t = t.strip_prefix('@').unwrap_or(t).trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(Source::new(t));
        }
    }
    out
}

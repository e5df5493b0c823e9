// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one monitored feed (e.g. a handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Source(String);

impl Source {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,        // unique within a source, stable across fetches
    pub content: String,   // may be empty
    pub timestamp: String, // display only, never used for ordering
    pub url: String,
}

impl Item {
    /// Item with only an id; the rest is left empty.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            timestamp: String::new(),
            url: String::new(),
        }
    }
}

/// Items of one poll, newest-first.
pub type FetchResult = Vec<Item>;

/// Produces the current newest-first item list for a source.
///
/// Implementations may be slow and may fail; an empty list is a valid answer
/// and does not mean the source has no items.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<FetchResult>;
    fn name(&self) -> &'static str;
}

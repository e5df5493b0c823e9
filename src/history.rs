//! Bounded, deduplicated window of recently seen item ids.
//!
//! Ids are kept newest-first. Overflow evicts from the old end, so an id that
//! falls out of the window is unknown again.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Default number of ids remembered per source.
pub const DEFAULT_WINDOW: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct RecencyWindow {
    /// Newest at the front.
    ids: VecDeque<String>,
    index: HashSet<String>,
    cap: usize,
}

impl RecencyWindow {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            ids: VecDeque::with_capacity(cap.min(1_000)),
            index: HashSet::with_capacity(cap.min(1_000)),
            cap,
        }
    }

    /// Build from ids ordered newest-first. The first occurrence of a
    /// duplicate wins; anything past `cap` is dropped.
    pub fn from_newest_first<I, S>(ids: I, cap: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut w = Self::with_capacity(cap);
        for id in ids {
            if w.ids.len() == w.cap {
                break;
            }
            let id = id.into();
            if w.index.insert(id.clone()) {
                w.ids.push_back(id);
            }
        }
        w
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Newest id, if any.
    pub fn front(&self) -> Option<&str> {
        self.ids.front().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Put `newest_first` ahead of the existing ids, i.e. the window becomes
    /// `dedup(newest_first ++ existing)` truncated to capacity.
    pub fn prepend<I, S>(&mut self, newest_first: I)
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: DoubleEndedIterator,
        S: Into<String>,
    {
        for id in newest_first.into_iter().rev() {
            let id = id.into();
            if !self.index.insert(id.clone()) {
                if let Some(pos) = self.ids.iter().position(|x| *x == id) {
                    self.ids.remove(pos);
                }
            }
            self.ids.push_front(id);
        }
        self.evict();
    }

    /// Change the capacity, evicting the oldest ids if it shrank.
    pub fn set_capacity(&mut self, cap: usize) {
        self.cap = cap.max(1);
        self.evict();
    }

    /// No duplicates, within capacity, index in sync with the ordered ids.
    pub fn is_consistent(&self) -> bool {
        self.ids.len() <= self.cap
            && self.index.len() == self.ids.len()
            && self.ids.iter().all(|id| self.index.contains(id))
    }

    fn evict(&mut self) {
        while self.ids.len() > self.cap {
            if let Some(old) = self.ids.pop_back() {
                self.index.remove(&old);
            }
        }
    }
}

impl Default for RecencyWindow {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_WINDOW)
    }
}

/// Equality is over the ordered ids only.
impl PartialEq for RecencyWindow {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for RecencyWindow {}

// Persisted windows may come from older layouts with duplicates; they are
// repaired here and trimmed to the configured size by the store on load.
impl From<Vec<String>> for RecencyWindow {
    fn from(ids: Vec<String>) -> Self {
        let cap = ids.len().max(DEFAULT_WINDOW);
        Self::from_newest_first(ids, cap)
    }
}

impl From<RecencyWindow> for Vec<String> {
    fn from(w: RecencyWindow) -> Self {
        w.ids.into_iter().collect()
    }
}

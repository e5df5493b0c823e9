// src/store.rs
//! Watermark persistence.
//!
//! A commit replaces one source's watermark. `JsonFileStore` rewrites the
//! whole map through a temp file + fsync + rename, and only updates its
//! in-memory copy once the rename succeeded, so readers never observe a
//! watermark that is not on disk.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::ingest::types::Source;
use crate::watermark::Watermark;

/// Storage capability injected into the scheduler. No policy lives here.
pub trait WatermarkStore: Send + Sync {
    fn get(&self, source: &Source) -> Option<Watermark>;
    /// Durable before returning `Ok`; on `Err` the previous value stays in force.
    fn commit(&self, source: &Source, watermark: &Watermark) -> Result<(), StoreError>;
}

/// Volatile store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<Source, Watermark>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WatermarkStore for MemoryStore {
    fn get(&self, source: &Source) -> Option<Watermark> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .cloned()
    }

    fn commit(&self, source: &Source, watermark: &Watermark) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.clone(), watermark.clone());
        Ok(())
    }
}

/// JSON file laid out as `{ source: { latest_id, recent_ids, last_checked } }`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    committed: Mutex<BTreeMap<Source, Watermark>>,
}

impl JsonFileStore {
    /// Load `path` (a missing file is an empty store) and repair every
    /// watermark for a window of `window` ids.
    pub fn open(path: impl Into<PathBuf>, window: usize) -> Result<Self, StoreError> {
        let path = path.into();
        let mut committed: BTreeMap<Source, Watermark> = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        for wm in committed.values_mut() {
            wm.repair(window);
        }

        tracing::info!(
            target: "store",
            path = %path.display(),
            sources = committed.len(),
            "watermark state loaded"
        );

        Ok(Self {
            path,
            committed: Mutex::new(committed),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> BTreeMap<Source, Watermark> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl WatermarkStore for JsonFileStore {
    fn get(&self, source: &Source) -> Option<Watermark> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .cloned()
    }

    fn commit(&self, source: &Source, watermark: &Watermark) -> Result<(), StoreError> {
        // Held across the write: one commit at a time for the whole file.
        let mut guard = self
            .committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut next = guard.clone();
        next.insert(source.clone(), watermark.clone());
        let content = serde_json::to_string_pretty(&next)?;
        write_atomic(&self.path, content.as_bytes())?;

        *guard = next;
        Ok(())
    }
}

/// Write `content` to `target` via a sibling temp file and a rename.
pub fn write_atomic(target: &Path, content: &[u8]) -> Result<(), StoreError> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io_err = |source| StoreError::Io {
        path: target.to_path_buf(),
        source,
    };

    fs::create_dir_all(&dir).map_err(io_err)?;
    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(content).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.as_file_mut().sync_all().map_err(io_err)?;
    tmp.persist(target).map_err(|e| io_err(e.error))?;
    Ok(())
}

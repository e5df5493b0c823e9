// src/error.rs
//! Typed failures for the storage, delivery and configuration seams.
//! Fetch failures stay opaque (`anyhow`) since fetchers are external.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode state: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("state file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Delivery is switched off (missing or placeholder credentials).
    #[error("delivery disabled: {0}")]
    Disabled(String),
    #[error("transport request failed: {reason}")]
    Transport { transient: bool, reason: String },
    #[error("transport rejected message with HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

impl DeliveryError {
    /// Timeouts, connect errors, HTTP 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            DeliveryError::Disabled(_) => false,
            DeliveryError::Transport { transient, .. } => *transient,
            DeliveryError::Http { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("{var} points to non-existent path {path}")]
    MissingEnvPath { var: &'static str, path: PathBuf },
}

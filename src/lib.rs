// src/lib.rs
//! feedwatch: polls reverse-chronological feeds and forwards every new item
//! exactly once per detection to a notifier.
//!
//! Flow per source: fetch → [`change_detector::detect`] → commit through a
//! [`store::WatermarkStore`] → deliver oldest-first through the
//! [`notify::NotifierGateway`]. The [`ingest::scheduler::Scheduler`] drives
//! sources one at a time with fixed pacing delays.

pub mod change_detector;
pub mod config;
pub mod error;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod store;
pub mod watermark;

// ---- Re-exports for stable public API ----
pub use crate::change_detector::{detect, DetectOutcome, Detection};
pub use crate::config::MonitorConfig;
pub use crate::error::{ConfigError, DeliveryError, StoreError};
pub use crate::history::{RecencyWindow, DEFAULT_WINDOW};
pub use crate::ingest::scheduler::{CycleReport, Pacing, Scheduler, SourceOutcome};
pub use crate::ingest::types::{FetchResult, Fetcher, Item, Source};
pub use crate::notify::{NotifierGateway, RetryPolicy, Transport};
pub use crate::store::{JsonFileStore, MemoryStore, WatermarkStore};
pub use crate::watermark::Watermark;

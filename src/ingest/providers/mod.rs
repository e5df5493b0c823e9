// src/ingest/providers/mod.rs
pub mod nitter_rss;

pub use nitter_rss::NitterRssFetcher;

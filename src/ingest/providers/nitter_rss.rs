// src/ingest/providers/nitter_rss.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use crate::ingest::normalize_text;
use crate::ingest::types::{FetchResult, Fetcher, Item, Source};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

static RE_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/status/([^/#?\s]+)").expect("valid status regex"));

/// Numeric post id from a `.../status/<id>#m` style link.
pub fn status_id(link: &str) -> Option<String> {
    RE_STATUS
        .captures(link)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// RFC 2822 `pubDate` rewritten as RFC 3339 UTC; unparseable input is kept as is.
fn display_timestamp(raw: &str) -> String {
    OffsetDateTime::parse(raw.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| dt.to_offset(UtcOffset::UTC).format(&Rfc3339).ok())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// Reads a handle's timeline from a Nitter mirror's RSS endpoint.
pub struct NitterRssFetcher {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

impl NitterRssFetcher {
    /// Serve the same XML for every source.
    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feedwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building nitter http client")?;
        Ok(Self {
            mode: Mode::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                client,
            },
        })
    }

    /// Parse an RSS document into newest-first items for `source`.
    pub fn parse_feed(source: &Source, xml: &str) -> Result<FetchResult> {
        let t0 = std::time::Instant::now();
        let rss: Rss = from_str(xml).context("parsing nitter rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let id = it
                .guid
                .as_deref()
                .and_then(status_id)
                .or_else(|| it.link.as_deref().and_then(status_id));
            let Some(id) = id else {
                tracing::debug!(target: "fetch", %source, link = ?it.link, "item without status id skipped");
                continue;
            };

            let body = it
                .description
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .or(it.title.as_deref())
                .unwrap_or_default();

            out.push(Item {
                url: format!("https://twitter.com/{}/status/{}", source.as_str(), id),
                id,
                content: normalize_text(body),
                timestamp: it.pub_date.as_deref().map(display_timestamp).unwrap_or_default(),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feedwatch_fetch_parse_ms").record(ms);
        counter!("feedwatch_fetched_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl Fetcher for NitterRssFetcher {
    async fn fetch(&self, source: &Source) -> Result<FetchResult> {
        match &self.mode {
            Mode::Fixture(xml) => Self::parse_feed(source, xml),
            Mode::Http { base_url, client } => {
                let url = format!("{base_url}/{}/rss", source.as_str());
                let resp = client
                    .get(&url)
                    .send()
                    .await
                    .with_context(|| format!("GET {url}"))?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("GET {url} returned HTTP {}", status.as_u16());
                }
                let body = resp.text().await.context("reading nitter rss body")?;
                Self::parse_feed(source, &body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "nitter-rss"
    }
}

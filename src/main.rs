//! feedwatch binary entrypoint.
//! Loads configuration, wires the Nitter fetcher, the JSON watermark store and
//! the Telegram gateway into a scheduler, and runs until Ctrl+C.
//!
//! Flags: `--once` runs a single cycle, `--dry-run` logs messages instead of
//! sending them.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedwatch::ingest::config::FileCatalog;
use feedwatch::ingest::providers::NitterRssFetcher;
use feedwatch::{JsonFileStore, MonitorConfig, NotifierGateway, Scheduler};

/// Compact logs by default; JSON lines when FEEDWATCH_LOG_JSON=1.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedwatch=info,warn"));
    let json = std::env::var("FEEDWATCH_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let once = args.iter().any(|a| a == "--once");
    let dry_run = args.iter().any(|a| a == "--dry-run");

    let cfg = MonitorConfig::load_default().context("loading configuration")?;
    tracing::info!(?cfg, once, dry_run, "configuration loaded");

    if let Some(addr) = cfg.metrics_addr {
        feedwatch::metrics::install_exporter(addr)?;
    }
    feedwatch::metrics::ensure_described();

    let store = JsonFileStore::open(&cfg.state_path, cfg.window_size)
        .with_context(|| format!("opening state file {}", cfg.state_path.display()))?;
    let fetcher =
        NitterRssFetcher::from_base_url(&cfg.base_url, Duration::from_secs(cfg.fetch_timeout_secs))?;
    let gateway = NotifierGateway::from_config(&cfg, dry_run);

    let scheduler = Scheduler::new(
        Box::new(FileCatalog::new(&cfg.sources_path)),
        Arc::new(fetcher),
        Arc::new(store),
        gateway,
    )
    .with_pacing(cfg.pacing())
    .with_window(cfg.window_size);

    let stop = CancellationToken::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("stop requested");
                stop.cancel();
            }
        });
    }

    if once {
        let report = scheduler.run_cycle(&stop).await;
        tracing::info!(
            polled = report.sources.len(),
            delivered = report.delivered(),
            failures = report.failures(),
            "single cycle done"
        );
    } else {
        scheduler.run(stop).await;
    }
    Ok(())
}

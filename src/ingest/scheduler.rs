// src/ingest/scheduler.rs
//! Polling loop: sources are visited strictly in order, one at a time.
//!
//! ```text
//! Idle -> Polling(0) -> Pacing(0) -> Polling(1) -> ... -> CycleSleep -> Idle
//!                 \-> fetch -> detect -> commit -> deliver (oldest-first)
//! ```
//!
//! Pacing sleeps and delivery backoff are the only timed suspension points
//! and every one of them races the stop token; the token is also checked
//! before each source. A failing source is reported and skipped, never fatal.
//! Watermark commits run on the blocking pool.

use chrono::Utc;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::change_detector::{detect, DetectOutcome};
use crate::history::DEFAULT_WINDOW;
use crate::ingest::config::SourceCatalog;
use crate::ingest::types::{Fetcher, Item, Source};
use crate::notify::NotifierGateway;
use crate::store::WatermarkStore;
use crate::watermark::Watermark;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    /// After every source, whatever happened.
    pub source_delay: Duration,
    /// Between two deliveries of the same source.
    pub notify_delay: Duration,
    /// Between the end of one cycle and the start of the next.
    pub cycle_interval: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            source_delay: Duration::from_secs(5),
            notify_delay: Duration::from_secs(1),
            cycle_interval: Duration::from_secs(60),
        }
    }
}

impl Pacing {
    /// No waiting anywhere; for tests and one-shot tools.
    pub fn none() -> Self {
        Self {
            source_delay: Duration::ZERO,
            notify_delay: Duration::ZERO,
            cycle_interval: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    FetchFailed { reason: String },
    /// Fetch succeeded with zero items.
    Empty,
    ColdStart { baseline: usize },
    Unchanged,
    NewItems {
        detected: usize,
        delivered: usize,
        failed: usize,
        /// Not attempted because a stop was requested mid-delivery.
        skipped: usize,
    },
    /// Commit failed; nothing delivered, the next cycle re-detects.
    StoreFailed { reason: String },
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: Source,
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub sources: Vec<SourceReport>,
    /// The cycle ended early on a stop request.
    pub stopped: bool,
}

impl CycleReport {
    pub fn outcome_for(&self, source: &Source) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|r| &r.source == source)
            .map(|r| &r.outcome)
    }

    pub fn delivered(&self) -> usize {
        self.sources
            .iter()
            .map(|r| match r.outcome {
                SourceOutcome::NewItems { delivered, .. } => delivered,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.sources
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    SourceOutcome::FetchFailed { .. } | SourceOutcome::StoreFailed { .. }
                ) || matches!(r.outcome, SourceOutcome::NewItems { failed, .. } if failed > 0)
            })
            .count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunState {
    Idle,
    CycleSleep,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CycleState {
    Polling(usize),
    Pacing(usize),
    Stopped,
}

pub struct Scheduler {
    catalog: Box<dyn SourceCatalog>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn WatermarkStore>,
    gateway: NotifierGateway,
    pacing: Pacing,
    window: usize,
}

impl Scheduler {
    pub fn new(
        catalog: Box<dyn SourceCatalog>,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn WatermarkStore>,
        gateway: NotifierGateway,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            store,
            gateway,
            pacing: Pacing::default(),
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Run cycles until `stop` is cancelled.
    pub async fn run(&self, stop: CancellationToken) {
        crate::metrics::ensure_described();
        info!(
            target: "scheduler",
            fetcher = self.fetcher.name(),
            transport = self.gateway.transport_name(),
            interval = ?self.pacing.cycle_interval,
            "monitoring started"
        );

        let mut state = RunState::Idle;
        loop {
            state = match state {
                RunState::Idle => {
                    if stop.is_cancelled() {
                        RunState::Stopped
                    } else if self.run_cycle(&stop).await.stopped {
                        RunState::Stopped
                    } else {
                        RunState::CycleSleep
                    }
                }
                RunState::CycleSleep => {
                    debug!(target: "scheduler", "next cycle in {:?}", self.pacing.cycle_interval);
                    if pause(&stop, self.pacing.cycle_interval).await {
                        RunState::Idle
                    } else {
                        RunState::Stopped
                    }
                }
                RunState::Stopped => break,
            };
        }

        info!(target: "scheduler", "monitoring stopped");
    }

    /// One pass over the current source list. Re-reads the list first.
    pub async fn run_cycle(&self, stop: &CancellationToken) -> CycleReport {
        let sources = match self.catalog.load() {
            Ok(v) => v,
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(target: "scheduler", error = %reason, "loading sources failed; cycle skipped");
                Vec::new()
            }
        };
        if sources.is_empty() {
            info!(target: "scheduler", "source list is empty; nothing to poll");
        } else {
            info!(target: "scheduler", sources = sources.len(), "cycle started");
        }

        let mut report = CycleReport::default();
        let mut state = CycleState::Polling(0);
        loop {
            state = match state {
                CycleState::Polling(i) if i >= sources.len() => break,
                CycleState::Polling(i) => {
                    if stop.is_cancelled() {
                        CycleState::Stopped
                    } else {
                        let source = &sources[i];
                        let outcome = self.process_source(source, stop).await;
                        report.sources.push(SourceReport {
                            source: source.clone(),
                            outcome,
                        });
                        CycleState::Pacing(i)
                    }
                }
                CycleState::Pacing(i) => {
                    if pause(stop, self.pacing.source_delay).await {
                        CycleState::Polling(i + 1)
                    } else {
                        CycleState::Stopped
                    }
                }
                CycleState::Stopped => {
                    report.stopped = true;
                    break;
                }
            };
        }

        counter!("feedwatch_cycles_total").increment(1);
        gauge!("feedwatch_last_cycle_ts").set(Utc::now().timestamp() as f64);
        info!(
            target: "scheduler",
            polled = report.sources.len(),
            delivered = report.delivered(),
            failures = report.failures(),
            stopped = report.stopped,
            "cycle finished"
        );
        report
    }

    /// Fetch, detect, commit, then deliver for one source. Every failure is
    /// reported in the returned outcome and the log.
    pub async fn process_source(&self, source: &Source, stop: &CancellationToken) -> SourceOutcome {
        counter!("feedwatch_fetch_total").increment(1);
        let fetched = match self.fetcher.fetch(source).await {
            Ok(v) => v,
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(target: "scheduler", %source, fetcher = self.fetcher.name(), error = %reason, "fetch failed");
                counter!("feedwatch_fetch_errors_total").increment(1);
                return SourceOutcome::FetchFailed { reason };
            }
        };
        debug!(target: "scheduler", %source, items = fetched.len(), "fetched");

        let previous = self.store.get(source);
        let detection = detect(previous.as_ref(), &fetched, self.window, Utc::now());

        let Some(watermark) = &detection.watermark else {
            debug!(target: "scheduler", %source, "empty fetch for a source with no state");
            return SourceOutcome::Empty;
        };

        // Commit happens-before delivery.
        if let Err(reason) = self.commit(source, watermark).await {
            error!(target: "scheduler", %source, error = %reason, "watermark commit failed; delivery skipped");
            counter!("feedwatch_store_errors_total").increment(1);
            return SourceOutcome::StoreFailed { reason };
        }

        match detection.outcome {
            DetectOutcome::Empty => {
                debug!(target: "scheduler", %source, "no items returned");
                SourceOutcome::Empty
            }
            DetectOutcome::ColdStart => {
                counter!("feedwatch_cold_starts_total").increment(1);
                info!(
                    target: "scheduler",
                    %source,
                    latest_id = ?watermark.latest_id,
                    known = watermark.recent_ids.len(),
                    "baseline stored; nothing reported on first observation"
                );
                SourceOutcome::ColdStart {
                    baseline: watermark.recent_ids.len(),
                }
            }
            DetectOutcome::Unchanged => {
                debug!(target: "scheduler", %source, "no new items");
                SourceOutcome::Unchanged
            }
            DetectOutcome::NewItems => {
                if detection.overlap_lost {
                    warn!(
                        target: "scheduler",
                        %source,
                        count = detection.new_items.len(),
                        "no known item in fetch; reporting all fetched items, older ones may be missed"
                    );
                }
                counter!("feedwatch_new_items_total").increment(detection.new_items.len() as u64);
                info!(target: "scheduler", %source, count = detection.new_items.len(), "new items detected");
                self.deliver_all(source, &detection.new_items, stop).await
            }
        }
    }

    /// Store writes block (file I/O, fsync); keep them off the async workers.
    async fn commit(&self, source: &Source, watermark: &Watermark) -> Result<(), String> {
        let store = Arc::clone(&self.store);
        let source = source.clone();
        let watermark = watermark.clone();
        tokio::task::spawn_blocking(move || store.commit(&source, &watermark))
            .await
            .map_err(|e| format!("commit task failed: {e}"))?
            .map_err(|e| e.to_string())
    }

    async fn deliver_all(
        &self,
        source: &Source,
        items: &[Item],
        stop: &CancellationToken,
    ) -> SourceOutcome {
        let detected = items.len();
        let mut delivered = 0;
        let mut failed = 0;

        for (i, item) in items.iter().enumerate() {
            if i > 0 && !pause(stop, self.pacing.notify_delay).await {
                for left in &items[i..] {
                    warn!(target: "scheduler", %source, item_id = %left.id, "stop requested; item not delivered");
                }
                return SourceOutcome::NewItems {
                    detected,
                    delivered,
                    failed,
                    skipped: detected - i,
                };
            }

            match self.gateway.deliver_until(source, item, stop).await {
                Ok(()) => {
                    delivered += 1;
                    info!(target: "scheduler", %source, item_id = %item.id, url = %item.url, "delivered");
                }
                Err(e) => {
                    // The watermark already moved past this item; it will not come back.
                    failed += 1;
                    warn!(target: "scheduler", %source, item_id = %item.id, error = %e, "delivery failed");
                }
            }
        }

        SourceOutcome::NewItems {
            detected,
            delivered,
            failed,
            skipped: 0,
        }
    }
}

/// Sleep for `dur` unless stopped first. `true` when the full delay elapsed.
pub(crate) async fn pause(stop: &CancellationToken, dur: Duration) -> bool {
    if stop.is_cancelled() {
        return false;
    }
    if dur.is_zero() {
        return true;
    }
    tokio::select! {
        _ = stop.cancelled() => false,
        _ = tokio::time::sleep(dur) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_returns_early_on_stop() {
        let stop = CancellationToken::new();
        let s2 = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            s2.cancel();
        });
        let t0 = std::time::Instant::now();
        assert!(!pause(&stop, Duration::from_secs(30)).await);
        assert!(t0.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn pause_completes_without_stop() {
        let stop = CancellationToken::new();
        assert!(pause(&stop, Duration::from_millis(5)).await);
        assert!(pause(&stop, Duration::ZERO).await);
    }

    #[test]
    fn report_counts_failures_per_source() {
        let report = CycleReport {
            sources: vec![
                SourceReport {
                    source: Source::new("a"),
                    outcome: SourceOutcome::FetchFailed {
                        reason: "boom".into(),
                    },
                },
                SourceReport {
                    source: Source::new("b"),
                    outcome: SourceOutcome::NewItems {
                        detected: 2,
                        delivered: 1,
                        failed: 1,
                        skipped: 0,
                    },
                },
                SourceReport {
                    source: Source::new("c"),
                    outcome: SourceOutcome::Unchanged,
                },
            ],
            stopped: false,
        };
        assert_eq!(report.failures(), 2);
        assert_eq!(report.delivered(), 1);
        assert_eq!(
            report.outcome_for(&Source::new("c")),
            Some(&SourceOutcome::Unchanged)
        );
    }
}

// src/notify/mod.rs
//! Notifier gateway: formats an item and hands it to a transport.
//!
//! The transport is external (Telegram, log, test doubles). The gateway owns
//! the retry policy and the "delivery disabled" state.

pub mod format;
pub mod telegram;

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::error::DeliveryError;
use crate::ingest::scheduler::pause;
use crate::ingest::types::{Item, Source};

pub use telegram::TelegramTransport;

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send an already formatted message.
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
    fn name(&self) -> &'static str;
}

/// Writes messages to the log instead of a network API.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait::async_trait]
impl Transport for LogTransport {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        tracing::info!(target: "notify", transport = "log", "\n{text}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per item, including the first.
    pub max_attempts: u8,
    /// Base delay, doubled after every failed attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u8) -> Duration {
        let shift = u32::from(attempt.saturating_sub(1)).min(10);
        self.backoff.saturating_mul(1u32 << shift)
    }
}

#[derive(Clone)]
pub struct NotifierGateway {
    transport: Option<Arc<dyn Transport>>,
    disabled_reason: String,
    retry: RetryPolicy,
}

impl NotifierGateway {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Some(Arc::new(transport)),
            disabled_reason: String::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Every `deliver` fails fast with [`DeliveryError::Disabled`].
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            transport: None,
            disabled_reason: reason.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Telegram when credentials are usable, otherwise disabled.
    /// `dry_run` routes everything to the log transport.
    pub fn from_config(cfg: &MonitorConfig, dry_run: bool) -> Self {
        let gateway = if dry_run {
            Self::new(LogTransport)
        } else {
            match cfg.telegram.credentials() {
                Ok((token, chat)) => {
                    let api_base = cfg
                        .telegram
                        .api_base
                        .as_deref()
                        .unwrap_or(TelegramTransport::DEFAULT_API_BASE);
                    Self::new(TelegramTransport::with_api_base(api_base, token, chat))
                }
                Err(reason) => {
                    tracing::warn!(target: "notify", %reason, "delivery disabled; detection continues");
                    Self::disabled(reason)
                }
            }
        };
        gateway.with_retry(cfg.retry_policy())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            ..retry
        };
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.as_ref().map_or("disabled", |t| t.name())
    }

    /// Format and send one item. Only transient failures are retried, and
    /// only up to the policy's attempt budget.
    pub async fn deliver(&self, source: &Source, item: &Item) -> Result<(), DeliveryError> {
        self.deliver_until(source, item, &CancellationToken::new()).await
    }

    /// Like [`deliver`](Self::deliver), but a stop request cuts the retry
    /// backoff short and the last failure is returned.
    pub async fn deliver_until(
        &self,
        source: &Source,
        item: &Item,
        stop: &CancellationToken,
    ) -> Result<(), DeliveryError> {
        let Some(transport) = &self.transport else {
            counter!("feedwatch_delivery_errors_total").increment(1);
            return Err(DeliveryError::Disabled(self.disabled_reason.clone()));
        };

        let text = format::format_item(source, item);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match transport.send(&text).await {
                Ok(()) => {
                    counter!("feedwatch_deliveries_total").increment(1);
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::debug!(
                        target: "notify",
                        %source,
                        item_id = %item.id,
                        attempt,
                        error = %e,
                        "transient delivery failure; retrying in {delay:?}"
                    );
                    if !pause(stop, delay).await {
                        tracing::debug!(target: "notify", %source, item_id = %item.id, "stop requested; retries abandoned");
                        counter!("feedwatch_delivery_errors_total").increment(1);
                        return Err(e);
                    }
                }
                Err(e) => {
                    counter!("feedwatch_delivery_errors_total").increment(1);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with the given errors in order, then succeeds.
    struct Scripted {
        failures: std::sync::Mutex<Vec<DeliveryError>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Transport for Scripted {
        async fn send(&self, _text: &str) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut f = self.failures.lock().unwrap();
            if f.is_empty() {
                Ok(())
            } else {
                Err(f.remove(0))
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn scripted(failures: Vec<DeliveryError>) -> (Scripted, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Scripted {
                failures: std::sync::Mutex::new(failures),
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn busy() -> DeliveryError {
        DeliveryError::Http {
            status: 503,
            body: String::new(),
        }
    }

    fn fast(max_attempts: u8) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn single_attempt_by_default() {
        let (t, calls) = scripted(vec![busy()]);
        let gw = NotifierGateway::new(t);
        let res = gw.deliver(&Source::new("a"), &Item::with_id("1")).await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_within_budget() {
        let (t, calls) = scripted(vec![busy(), busy()]);
        let gw = NotifierGateway::new(t).with_retry(fast(3));
        gw.deliver(&Source::new("a"), &Item::with_id("1"))
            .await
            .expect("third attempt succeeds");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let bad = DeliveryError::Http {
            status: 400,
            body: "bad request".into(),
        };
        let (t, calls) = scripted(vec![bad]);
        let gw = NotifierGateway::new(t).with_retry(fast(5));
        assert!(gw.deliver(&Source::new("a"), &Item::with_id("1")).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_gateway_short_circuits() {
        let gw = NotifierGateway::disabled("no token");
        assert!(!gw.is_enabled());
        let err = gw
            .deliver(&Source::new("a"), &Item::with_id("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Disabled(ref r) if r == "no token"));
    }

    #[tokio::test]
    async fn stop_cuts_the_backoff_short() {
        let (t, calls) = scripted(vec![busy(), busy()]);
        let gw = NotifierGateway::new(t).with_retry(RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_secs(30),
        });
        let stop = CancellationToken::new();
        let s2 = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            s2.cancel();
        });

        let res = tokio::time::timeout(
            Duration::from_secs(5),
            gw.deliver_until(&Source::new("a"), &Item::with_id("1"), &stop),
        )
        .await
        .expect("backoff interrupted");
        assert!(matches!(res, Err(DeliveryError::Http { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy {
            max_attempts: 4,
            backoff: Duration::from_millis(500),
        };
        assert_eq!(p.delay_after(1), Duration::from_millis(500));
        assert_eq!(p.delay_after(2), Duration::from_millis(1000));
        assert_eq!(p.delay_after(3), Duration::from_millis(2000));
    }
}

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feedwatch_cycles_total", "Completed polling cycles.");
        describe_counter!("feedwatch_fetch_total", "Fetch attempts across all sources.");
        describe_counter!("feedwatch_fetch_errors_total", "Failed fetches.");
        describe_counter!(
            "feedwatch_fetched_items_total",
            "Items parsed from fetched feeds."
        );
        describe_histogram!(
            "feedwatch_fetch_parse_ms",
            "Feed parse time in milliseconds."
        );
        describe_counter!("feedwatch_cold_starts_total", "Sources baselined.");
        describe_counter!("feedwatch_new_items_total", "Items detected as new.");
        describe_counter!(
            "feedwatch_store_errors_total",
            "Watermark commits that did not persist."
        );
        describe_counter!("feedwatch_deliveries_total", "Items delivered.");
        describe_counter!(
            "feedwatch_delivery_errors_total",
            "Items whose delivery failed or was disabled."
        );
        describe_gauge!(
            "feedwatch_last_cycle_ts",
            "Unix ts when the last polling cycle finished."
        );
    });
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
/// Must run inside the Tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("prometheus: listen on {addr}"))?;
    ensure_described();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

//! Demo that pushes one sample item through the configured gateway
//! (log only when Telegram credentials are missing or `--dry-run` is given).

use chrono::Utc;
use feedwatch::{Item, MonitorConfig, NotifierGateway, Source};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = MonitorConfig::load_default()?;
    let dry_run = std::env::args().any(|a| a == "--dry-run");
    let gateway = NotifierGateway::from_config(&cfg, dry_run);

    let source = Source::new("feedwatch");
    let item = Item {
        id: "0".into(),
        content: "Test notification: if you can read this, delivery works.".into(),
        timestamp: Utc::now().to_rfc3339(),
        url: "https://github.com".into(),
    };

    match gateway.deliver(&source, &item).await {
        Ok(()) => println!("notify-demo: delivered via {}", gateway.transport_name()),
        Err(e) => println!("notify-demo: delivery failed: {e}"),
    }
    Ok(())
}

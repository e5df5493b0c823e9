use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Transport;
use crate::error::DeliveryError;

/// Telegram Bot API `sendMessage` transport.
#[derive(Clone)]
pub struct TelegramTransport {
    endpoint: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
}

impl TelegramTransport {
    pub const DEFAULT_API_BASE: &'static str = "https://api.telegram.org";

    pub fn new(bot_token: &str, chat_id: impl Into<String>) -> Self {
        Self::with_api_base(Self::DEFAULT_API_BASE, bot_token, chat_id)
    }

    pub fn with_api_base(api_base: &str, bot_token: &str, chat_id: impl Into<String>) -> Self {
        Self {
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            chat_id: chat_id.into(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: false,
        };

        let rsp = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            // The URL carries the bot token; keep it out of error text.
            .map_err(|e| DeliveryError::Transport {
                transient: e.is_timeout() || e.is_connect(),
                reason: e.without_url().to_string(),
            })?;

        let status = rsp.status();
        if status.is_success() {
            return Ok(());
        }
        let body: String = rsp.text().await.unwrap_or_default().chars().take(300).collect();
        Err(DeliveryError::Http {
            status: status.as_u16(),
            body,
        })
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

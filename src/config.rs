// src/config.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::history::DEFAULT_WINDOW;
use crate::ingest::scheduler::Pacing;
use crate::notify::RetryPolicy;

pub const ENV_CONFIG_PATH: &str = "FEEDWATCH_CONFIG";
pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT: &str = "TELEGRAM_CHAT_ID";

const DEFAULT_TOML_PATH: &str = "config/feedwatch.toml";
const DEFAULT_JSON_PATH: &str = "config/feedwatch.json";

const PLACEHOLDER_TOKEN: &str = "YOUR_BOT_TOKEN_HERE";
const PLACEHOLDER_CHAT: &str = "YOUR_CHAT_ID_HERE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sources_path: PathBuf,
    pub state_path: PathBuf,
    /// Nitter mirror, without trailing slash.
    pub base_url: String,
    /// Ids remembered per source (K).
    pub window_size: usize,
    pub source_delay_secs: u64,
    pub notify_delay_secs: u64,
    pub cycle_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub notify_max_attempts: u8,
    pub notify_backoff_ms: u64,
    /// Prometheus listener; metrics stay in-process when unset.
    pub metrics_addr: Option<SocketAddr>,
    pub telegram: TelegramConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sources_path: PathBuf::from("usernames.txt"),
            state_path: PathBuf::from("state/watermarks.json"),
            base_url: "https://nitter.net".to_string(),
            window_size: DEFAULT_WINDOW,
            source_delay_secs: 5,
            notify_delay_secs: 1,
            cycle_interval_secs: 60,
            fetch_timeout_secs: 20,
            notify_max_attempts: 1,
            notify_backoff_ms: 500,
            metrics_addr: None,
            telegram: TelegramConfig::default(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Override for tests or a self-hosted Bot API server.
    pub api_base: Option<String>,
}

// Never print the token.
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &format_args!("<{} chars>", self.bot_token.len()))
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl TelegramConfig {
    /// `(token, chat_id)` when both are usable, otherwise why delivery is off.
    pub fn credentials(&self) -> Result<(&str, &str), String> {
        let token = self.bot_token.trim();
        let chat = self.chat_id.trim();
        if token.is_empty() || token == PLACEHOLDER_TOKEN {
            return Err("telegram bot token is not configured".to_string());
        }
        if chat.is_empty() || chat == PLACEHOLDER_CHAT {
            return Err("telegram chat id is not configured".to_string());
        }
        Ok((token, chat))
    }
}

impl MonitorConfig {
    /// Load from an explicit path. TOML or JSON, picked by extension.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = Self::parse(&content, &ext).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Resolve the config file, then apply environment overrides:
    /// 1) $FEEDWATCH_CONFIG
    /// 2) config/feedwatch.toml
    /// 3) config/feedwatch.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::MissingEnvPath {
                    var: ENV_CONFIG_PATH,
                    path: pb,
                });
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_TOML_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_TOML_PATH))?
        } else if Path::new(DEFAULT_JSON_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_JSON_PATH))?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Telegram credentials from the environment win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(token) = non_empty_env(ENV_TELEGRAM_TOKEN) {
            self.telegram.bot_token = token;
        }
        if let Some(chat) = non_empty_env(ENV_TELEGRAM_CHAT) {
            self.telegram.chat_id = chat;
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            source_delay: Duration::from_secs(self.source_delay_secs),
            notify_delay: Duration::from_secs(self.notify_delay_secs),
            cycle_interval: Duration::from_secs(self.cycle_interval_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.notify_max_attempts,
            backoff: Duration::from_millis(self.notify_backoff_ms),
        }
    }

    fn parse(s: &str, hint_ext: &str) -> Result<Self, String> {
        match hint_ext {
            "toml" => toml::from_str(s).map_err(|e| e.to_string()),
            "json" => serde_json::from_str(s).map_err(|e| e.to_string()),
            _ => toml::from_str(s)
                .map_err(|e| e.to_string())
                .or_else(|toml_err| {
                    serde_json::from_str(s)
                        .map_err(|json_err| format!("not TOML ({toml_err}) nor JSON ({json_err})"))
                }),
        }
    }

    fn sanitize(&mut self) {
        if self.window_size == 0 {
            self.window_size = 1;
        }
        if self.notify_max_attempts == 0 {
            self.notify_max_attempts = 1;
        }
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

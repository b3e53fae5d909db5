//! Configuration management for Pricewatch

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ThresholdConfig, Watchlist};

/// Environment variable prefix for overrides (`PRICEWATCH__MONITOR__POLL_INTERVAL_SECONDS`)
pub const ENV_PREFIX: &str = "PRICEWATCH";

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "pricewatch.toml";

const PLACEHOLDER_TOKEN: &str = "YOUR_BOT_TOKEN_HERE";
const PLACEHOLDER_CHAT_ID: &str = "YOUR_CHAT_ID_HERE";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Poll loop configuration
    pub monitor: MonitorConfig,

    /// Price source configuration
    pub price_source: PriceSourceConfig,

    /// Notification channels
    pub notifications: NotificationsConfig,

    /// HTTP API configuration
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Symbol to thresholds
    pub watchlist: BTreeMap<String, ThresholdConfig>,
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and the environment
    ///
    /// An explicitly given path must exist; the fallback locations are optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let defaults = config::Config::try_from(&Config::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                for candidate in default_config_paths() {
                    debug!(path = %candidate.display(), "Checking for configuration file");
                    builder = builder.add_source(config::File::from(candidate).required(false));
                }
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string layered over the defaults
    pub fn from_toml(source: &str) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let config: Config = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the monitor cannot run safely with
    pub fn validate(&self) -> Result<()> {
        if self.monitor.poll_interval_seconds == 0 {
            return Err(Error::config("monitor.poll_interval_seconds must be at least 1"));
        }
        if self.monitor.fetch_timeout_seconds == 0 {
            return Err(Error::config("monitor.fetch_timeout_seconds must be at least 1"));
        }

        self.watchlist()?;

        let telegram = &self.notifications.telegram;
        if telegram.enabled && !telegram.is_configured() {
            return Err(Error::config(
                "notifications.telegram is enabled but token or chat_id is missing",
            ));
        }

        let ntfy = &self.notifications.ntfy;
        if ntfy.enabled && ntfy.topic.trim().is_empty() {
            return Err(Error::config("notifications.ntfy is enabled but topic is empty"));
        }

        Ok(())
    }

    /// The validated watchlist snapshot described by this configuration
    pub fn watchlist(&self) -> Result<Watchlist> {
        Watchlist::new(self.watchlist.iter().map(|(s, t)| (s.as_str(), *t)))
            .map_err(|e| Error::config(format!("watchlist: {e}")))
    }
}

/// Candidate config file locations, lowest precedence first
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dirs) = directories::ProjectDirs::from("", "", "pricewatch") {
        paths.push(dirs.config_dir().join(DEFAULT_CONFIG_FILE));
    }
    paths.push(PathBuf::from(DEFAULT_CONFIG_FILE));
    paths
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Maximum connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://pricewatch.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between poll cycles
    pub poll_interval_seconds: u64,
    /// Upper bound on a single price fetch
    pub fetch_timeout_seconds: u64,
    /// Rebuild hysteresis state from alert history on startup
    pub restore_alert_state: bool,
}

impl MonitorConfig {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Fetch timeout as a duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 60,
            fetch_timeout_seconds: 15,
            restore_alert_state: true,
        }
    }
}

/// Which price source to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSourceKind {
    /// Yahoo Finance chart API
    #[default]
    Yahoo,
    /// Randomized prices around fixed base values
    Demo,
}

/// Price source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceSourceConfig {
    /// Source implementation
    pub kind: PriceSourceKind,
    /// Base URL of the quote API
    pub base_url: String,
    /// HTTP timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for PriceSourceConfig {
    fn default() -> Self {
        Self {
            kind: PriceSourceKind::Yahoo,
            base_url: "https://query1.finance.yahoo.com".to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Notification channels configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Print every message to the console, not only when all channels fail
    pub console_always: bool,
    /// Upper bound on a single channel send
    pub send_timeout_seconds: u64,
    /// Telegram bot
    pub telegram: TelegramConfig,
    /// ntfy push
    pub ntfy: NtfyConfig,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            console_always: true,
            send_timeout_seconds: 10,
            telegram: TelegramConfig::default(),
            ntfy: NtfyConfig::default(),
        }
    }
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether the channel is used
    pub enabled: bool,
    /// Bot token from @BotFather
    pub token: String,
    /// Target chat id (negative for groups)
    pub chat_id: String,
    /// Bot API base URL
    pub api_base: String,
}

impl TelegramConfig {
    /// Token and chat id are set and not the sample placeholders
    pub fn is_configured(&self) -> bool {
        let token = self.token.trim();
        let chat_id = self.chat_id.trim();
        !token.is_empty()
            && !chat_id.is_empty()
            && token != PLACEHOLDER_TOKEN
            && chat_id != PLACEHOLDER_CHAT_ID
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

/// ntfy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NtfyConfig {
    /// Whether the channel is used
    pub enabled: bool,
    /// ntfy server
    pub server: String,
    /// Topic to publish to
    pub topic: String,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: "https://ntfy.sh".to_string(),
            topic: String::new(),
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Serve the HTTP API alongside the monitor
    pub enabled: bool,
    /// Host to bind to
    pub host: String,
    /// HTTP port
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

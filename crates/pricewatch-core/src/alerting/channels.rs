//! Concrete notification channels

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{NtfyConfig, TelegramConfig};

use super::notifier::{check_response, Notification, NotificationChannel, NotificationError};

/// Telegram Bot API `sendMessage`
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramChannel {
    /// Create a channel from validated settings
    pub fn new(client: Client, config: &TelegramConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn id(&self) -> &str {
        "telegram"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("text", notification.text.as_str()),
                ("parse_mode", "Markdown"),
            ])
            .send()
            .await?;

        check_response(self.id(), response).await?;
        info!(chat_id = %self.chat_id, "Telegram notification sent");
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), NotificationError> {
        let response = self.client.get(self.method_url("getMe")).send().await?;
        check_response(self.id(), response).await
    }
}

/// ntfy JSON publish
///
/// Publishing as JSON keeps emoji titles out of HTTP headers.
pub struct NtfyChannel {
    client: Client,
    server: String,
    topic: String,
}

#[derive(Debug, Serialize)]
struct NtfyMessage<'a> {
    topic: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    priority: u8,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    tags: &'a [String],
}

impl NtfyChannel {
    /// Create a channel from validated settings
    pub fn new(client: Client, config: &NtfyConfig) -> Self {
        Self {
            client,
            server: config.server.trim_end_matches('/').to_string(),
            topic: config.topic.clone(),
        }
    }
}

#[async_trait]
impl NotificationChannel for NtfyChannel {
    fn id(&self) -> &str {
        "ntfy"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let payload = NtfyMessage {
            topic: &self.topic,
            message: notification.plain_text(),
            title: notification.title.as_deref(),
            priority: notification.priority.ntfy_value(),
            tags: &notification.tags,
        };

        let response = self.client.post(&self.server).json(&payload).send().await?;

        check_response(self.id(), response).await?;
        info!(topic = %self.topic, "ntfy notification sent");
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), NotificationError> {
        let response = self.client.get(&self.server).send().await?;
        check_response(self.id(), response).await
    }
}

const BANNER_WIDTH: usize = 60;

/// Prints a framed block to stderr; the last resort that always succeeds
///
/// Stdout is left to command output, so `--format json` stays parseable.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    /// Create the console channel
    pub fn new() -> Self {
        Self
    }

    /// Framed plain-text rendering of a notification
    pub fn render(notification: &Notification) -> String {
        let rule = "=".repeat(BANNER_WIDTH);
        let title = notification.title.as_deref().unwrap_or("🚨 PRICE ALERT 🚨");
        format!(
            "\n{rule}\n{title}\n{rule}\n{}\n{rule}\n",
            notification.plain_text()
        )
    }
}

#[async_trait]
impl NotificationChannel for ConsoleChannel {
    fn id(&self) -> &str {
        "console"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        eprintln!("{}", Self::render(notification));
        debug!("Console notification printed");
        Ok(())
    }
}

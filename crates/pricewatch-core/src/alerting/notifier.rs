//! Notification payloads and the channel capability

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Delivery urgency, mapped onto ntfy's 1-5 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// ntfy 1
    Min,
    /// ntfy 2
    Low,
    /// ntfy 3
    #[default]
    Default,
    /// ntfy 4, used for threshold alerts
    High,
    /// ntfy 5
    Urgent,
}

impl Priority {
    /// Numeric priority understood by ntfy
    pub fn ntfy_value(self) -> u8 {
        match self {
            Priority::Min => 1,
            Priority::Low => 2,
            Priority::Default => 3,
            Priority::High => 4,
            Priority::Urgent => 5,
        }
    }
}

/// One logical message, formatted per channel at send time
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Markdown body
    pub text: String,
    /// Headline; channels without titles ignore it
    pub title: Option<String>,
    /// Delivery urgency
    pub priority: Priority,
    /// ntfy tags (rendered as emoji by ntfy clients)
    pub tags: Vec<String>,
}

impl Notification {
    /// Create an untitled notification at default priority
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
            priority: Priority::Default,
            tags: Vec::new(),
        }
    }

    /// Set the headline
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the urgency
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Replace the tag list
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Body with markdown emphasis and code markers removed
    pub fn plain_text(&self) -> String {
        plain_text(&self.text)
    }
}

/// Strip the markdown markers our messages use
pub fn plain_text(markdown: &str) -> String {
    markdown.chars().filter(|c| !matches!(c, '*' | '`')).collect()
}

/// Outcome of sending to one channel
#[derive(Debug, Clone, Serialize)]
pub struct NotificationResult {
    /// Channel the attempt went to
    pub channel_id: String,
    /// Whether the channel accepted the message
    pub success: bool,
    /// Error text when it did not
    pub error: Option<String>,
    /// When the attempt finished
    pub sent_at: DateTime<Utc>,
}

impl NotificationResult {
    pub(crate) fn from_outcome(channel_id: &str, outcome: Result<(), NotificationError>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            success: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
            sent_at: Utc::now(),
        }
    }
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-2xx status
    #[error("{channel} returned {status}: {body}")]
    Rejected {
        /// Channel identifier
        channel: String,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Channel is missing credentials or settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// The send did not finish within the dispatcher's timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The channel panicked while sending
    #[error("channel panicked: {0}")]
    Panicked(String),
}

/// One notification transport
///
/// Implementations report failure through the returned error and must not
/// retry internally beyond what their transport does on its own.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable identifier used in logs and results
    fn id(&self) -> &str;

    /// Deliver a notification
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;

    /// Check credentials and reachability without sending anything
    async fn test_connection(&self) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Map a non-2xx response into [`NotificationError::Rejected`]
pub(crate) async fn check_response(
    channel: &str,
    response: reqwest::Response,
) -> Result<(), NotificationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotificationError::Rejected {
        channel: channel.to_string(),
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_strips_markdown() {
        let n = Notification::new("📈 *ALERT: AAPL* `AAPL  $ 201.00`");
        assert_eq!(n.plain_text(), "📈 ALERT: AAPL AAPL  $ 201.00");
    }

    #[test]
    fn test_builder_sets_metadata() {
        let n = Notification::new("body")
            .with_title("🧪 Test Alert")
            .with_priority(Priority::Low)
            .with_tags(["test"]);

        assert_eq!(n.title.as_deref(), Some("🧪 Test Alert"));
        assert_eq!(n.priority.ntfy_value(), 2);
        assert_eq!(n.tags, vec!["test".to_string()]);
    }

    #[test]
    fn test_result_records_error_text() {
        let result = NotificationResult::from_outcome("ntfy", Err(NotificationError::Timeout(Duration::from_secs(10))));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("timed out after 10s"));
    }
}

//! Fan-out of one notification to every configured channel

use futures::FutureExt;
use reqwest::Client;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::NotificationsConfig;
use crate::error::Result;

use super::channels::{ConsoleChannel, NtfyChannel, TelegramChannel};
use super::notifier::{Notification, NotificationChannel, NotificationError, NotificationResult};

/// Delivery totals for one dispatch
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// Configured channels tried
    pub attempted: usize,
    /// Configured channels that accepted the message
    pub succeeded: usize,
    /// Whether the fallback channel was also used
    pub console_fallback: bool,
    /// Per-channel outcomes in send order, fallback excluded
    pub results: Vec<NotificationResult>,
}

impl DispatchReport {
    /// True when at least one configured channel delivered
    pub fn delivered(&self) -> bool {
        self.succeeded > 0
    }
}

/// Sends notifications to an ordered list of channels with a console fallback
pub struct Dispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    fallback: Arc<dyn NotificationChannel>,
    console_always: bool,
    send_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher that falls back to the console
    pub fn new(
        channels: Vec<Arc<dyn NotificationChannel>>,
        console_always: bool,
        send_timeout: Duration,
    ) -> Self {
        Self::with_fallback(channels, Arc::new(ConsoleChannel::new()), console_always, send_timeout)
    }

    /// Create a dispatcher with an explicit fallback channel
    pub fn with_fallback(
        channels: Vec<Arc<dyn NotificationChannel>>,
        fallback: Arc<dyn NotificationChannel>,
        console_always: bool,
        send_timeout: Duration,
    ) -> Self {
        Self {
            channels,
            fallback,
            console_always,
            send_timeout,
        }
    }

    /// Build the enabled channels from configuration
    pub fn from_config(config: &NotificationsConfig) -> Result<Self> {
        let send_timeout = Duration::from_secs(config.send_timeout_seconds);
        let client = Client::builder().timeout(send_timeout).build()?;

        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        if config.telegram.enabled {
            channels.push(Arc::new(TelegramChannel::new(client.clone(), &config.telegram)));
        }
        if config.ntfy.enabled {
            channels.push(Arc::new(NtfyChannel::new(client, &config.ntfy)));
        }

        let dispatcher = Self::new(channels, config.console_always, send_timeout);
        if dispatcher.channels.is_empty() {
            warn!("No notification channels configured, using console only");
        } else {
            info!(channels = ?dispatcher.channel_ids(), "Notification channels configured");
        }

        Ok(dispatcher)
    }

    /// Identifiers of the configured channels, in send order
    pub fn channel_ids(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.id()).collect()
    }

    /// Send to every channel in order, then to the fallback if nothing
    /// succeeded or console output is always on
    ///
    /// Channel errors, timeouts and panics are all recorded as failures;
    /// nothing escapes this call.
    pub async fn dispatch(&self, notification: &Notification) -> DispatchReport {
        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let result = self.send_one(channel.as_ref(), notification).await;
            if let Some(error) = &result.error {
                warn!(channel = %result.channel_id, error = %error, "Notification failed");
            }
            results.push(result);
        }

        let attempted = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();

        let console_fallback = succeeded == 0 || self.console_always;
        if console_fallback {
            if succeeded == 0 && attempted > 0 {
                warn!(attempted, "All notification channels failed, falling back to console");
            }
            let fallback = self.send_one(self.fallback.as_ref(), notification).await;
            if let Some(error) = &fallback.error {
                warn!(channel = %fallback.channel_id, error = %error, "Fallback notification failed");
            }
        }

        info!(succeeded, attempted, console_fallback, "Notification dispatched");

        DispatchReport {
            attempted,
            succeeded,
            console_fallback,
            results,
        }
    }

    /// Check every configured channel's connection
    pub async fn test_connections(&self) -> Vec<NotificationResult> {
        let mut results = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let outcome = self
                .guarded(AssertUnwindSafe(channel.test_connection()))
                .await;
            results.push(NotificationResult::from_outcome(channel.id(), outcome));
        }
        results
    }

    async fn send_one(
        &self,
        channel: &dyn NotificationChannel,
        notification: &Notification,
    ) -> NotificationResult {
        let outcome = self
            .guarded(AssertUnwindSafe(channel.send(notification)))
            .await;
        NotificationResult::from_outcome(channel.id(), outcome)
    }

    async fn guarded<F>(&self, fut: AssertUnwindSafe<F>) -> std::result::Result<(), NotificationError>
    where
        F: std::future::Future<Output = std::result::Result<(), NotificationError>>,
    {
        match tokio::time::timeout(self.send_timeout, fut.catch_unwind()).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(panic)) => Err(NotificationError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(NotificationError::Timeout(self.send_timeout)),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Hang,
        Panic,
    }

    struct FakeChannel {
        id: &'static str,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeChannel {
        fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NotificationChannel for FakeChannel {
        fn id(&self) -> &str {
            self.id
        }

        async fn send(&self, _notification: &Notification) -> std::result::Result<(), NotificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(NotificationError::Config("boom".to_string())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                Behavior::Panic => panic!("transport exploded"),
            }
        }
    }

    fn dispatcher(
        channels: &[Arc<FakeChannel>],
        fallback: &Arc<FakeChannel>,
        console_always: bool,
    ) -> Dispatcher {
        Dispatcher::with_fallback(
            channels
                .iter()
                .map(|c| c.clone() as Arc<dyn NotificationChannel>)
                .collect(),
            fallback.clone(),
            console_always,
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_partial_failure_skips_fallback() {
        let failing = FakeChannel::new("telegram", Behavior::Fail);
        let working = FakeChannel::new("ntfy", Behavior::Succeed);
        let console = FakeChannel::new("console", Behavior::Succeed);

        let report = dispatcher(&[failing.clone(), working.clone()], &console, false)
            .dispatch(&Notification::new("hello"))
            .await;

        assert_eq!((report.succeeded, report.attempted), (1, 2));
        assert!(!report.console_fallback);
        assert_eq!(console.calls(), 0);
        assert_eq!((failing.calls(), working.calls()), (1, 1));
    }

    #[tokio::test]
    async fn test_all_failed_falls_back_exactly_once() {
        let channels = [
            FakeChannel::new("a", Behavior::Fail),
            FakeChannel::new("b", Behavior::Fail),
            FakeChannel::new("c", Behavior::Fail),
        ];
        let console = FakeChannel::new("console", Behavior::Succeed);

        let report = dispatcher(&channels, &console, false)
            .dispatch(&Notification::new("hello"))
            .await;

        assert_eq!((report.succeeded, report.attempted), (0, 3));
        assert!(report.console_fallback);
        assert_eq!(console.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_channels_still_reaches_console() {
        let console = FakeChannel::new("console", Behavior::Succeed);
        let report = dispatcher(&[], &console, false)
            .dispatch(&Notification::new("hello"))
            .await;

        assert_eq!((report.succeeded, report.attempted), (0, 0));
        assert_eq!(console.calls(), 1);
    }

    #[tokio::test]
    async fn test_console_always_prints_after_success() {
        let working = FakeChannel::new("ntfy", Behavior::Succeed);
        let console = FakeChannel::new("console", Behavior::Succeed);

        let report = dispatcher(&[working], &console, true)
            .dispatch(&Notification::new("hello"))
            .await;

        assert!(report.delivered());
        assert!(report.console_fallback);
        assert_eq!(console.calls(), 1);
    }

    #[tokio::test]
    async fn test_console_always_with_all_failed_prints_once() {
        let channels = [
            FakeChannel::new("telegram", Behavior::Fail),
            FakeChannel::new("ntfy", Behavior::Fail),
        ];
        let console = FakeChannel::new("console", Behavior::Succeed);

        let report = dispatcher(&channels, &console, true)
            .dispatch(&Notification::new("hello"))
            .await;

        assert_eq!((report.succeeded, report.attempted), (0, 2));
        assert!(report.console_fallback);
        assert!(!report.delivered());
        assert_eq!(console.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_and_panic_become_failures() {
        let hanging = FakeChannel::new("slow", Behavior::Hang);
        let panicking = FakeChannel::new("broken", Behavior::Panic);
        let working = FakeChannel::new("ntfy", Behavior::Succeed);
        let console = FakeChannel::new("console", Behavior::Succeed);

        let report = dispatcher(
            &[hanging, panicking, working.clone()],
            &console,
            false,
        )
        .dispatch(&Notification::new("hello"))
        .await;

        assert_eq!((report.succeeded, report.attempted), (1, 3));
        assert_eq!(working.calls(), 1);

        let errors: Vec<Option<&str>> = report.results.iter().map(|r| r.error.as_deref()).collect();
        assert_eq!(
            errors,
            vec![
                Some("timed out after 200ms"),
                Some("channel panicked: transport exploded"),
                None
            ]
        );
    }

    #[test]
    fn test_from_config_orders_enabled_channels() {
        let mut config = NotificationsConfig::default();
        config.ntfy.enabled = true;
        config.ntfy.topic = "prices".to_string();
        assert_eq!(Dispatcher::from_config(&config).unwrap().channel_ids(), vec!["ntfy"]);

        config.telegram.enabled = true;
        config.telegram.token = "123:abc".to_string();
        config.telegram.chat_id = "42".to_string();
        assert_eq!(
            Dispatcher::from_config(&config).unwrap().channel_ids(),
            vec!["telegram", "ntfy"]
        );

        let console_only = Dispatcher::from_config(&NotificationsConfig::default()).unwrap();
        assert!(console_only.channel_ids().is_empty());
    }

    #[tokio::test]
    async fn test_results_follow_channel_order() {
        let channels = [
            FakeChannel::new("first", Behavior::Succeed),
            FakeChannel::new("second", Behavior::Fail),
        ];
        let console = FakeChannel::new("console", Behavior::Succeed);
        let d = dispatcher(&channels, &console, false);

        assert_eq!(d.channel_ids(), vec!["first", "second"]);
        let report = d.dispatch(&Notification::new("hello")).await;
        let ids: Vec<&str> = report.results.iter().map(|r| r.channel_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }
}

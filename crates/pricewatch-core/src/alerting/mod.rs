//! Alerting for pricewatch
//!
//! Threshold evaluation with hysteresis and multi-channel notification
//! delivery with a console fallback.

mod channels;
mod dispatcher;
mod evaluator;
mod notifier;

pub use channels::{ConsoleChannel, NtfyChannel, TelegramChannel};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use evaluator::{evaluate, ThresholdEvaluator};
pub use notifier::{
    plain_text, Notification, NotificationChannel, NotificationError, NotificationResult, Priority,
};

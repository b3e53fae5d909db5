//! # Pricewatch
//!
//! Threshold price alerts for stocks and crypto.
//!
//! Pricewatch polls a price for every watched symbol on a fixed interval,
//! records it, and notifies you once per threshold crossing rather than once
//! per sample.
//!
//! ## Architecture
//!
//! - **Monitor**: the poll cycle controller (fetch, persist, evaluate, dispatch)
//! - **Alerting**: hysteresis evaluator and multi-channel dispatcher with console fallback
//! - **Storage**: SQLite price and alert history
//! - **API**: optional REST API for watchlist edits and history queries
//!
//! ## Quick Start
//!
//! ```bash
//! # Run one cycle and print what happened
//! pricewatch check
//!
//! # Poll forever, with the HTTP API
//! pricewatch run --serve
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod monitor;
pub mod price;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{Dispatcher, Notification, NotificationChannel, ThresholdEvaluator};
    pub use crate::config::Config;
    pub use crate::db::{Database, HistoryStore};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::monitor::{Monitor, WatchlistHandle};
    pub use crate::price::PriceSource;
}

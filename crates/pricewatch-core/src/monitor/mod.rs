//! Poll cycle controller
//!
//! One cycle fetches every watched symbol, persists the samples, evaluates
//! thresholds, dispatches and records each alert, then sends one summary.
//! Cycles never overlap; the run loop only looks at the shutdown token
//! between them.

mod cycle;
mod format;
mod watchlist;

pub use cycle::CycleReport;
pub use format::{alert_notification, summary_notification, test_notification};
pub use watchlist::WatchlistHandle;

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerting::{Dispatcher, ThresholdEvaluator};
use crate::config::{Config, MonitorConfig};
use crate::db::HistoryStore;
use crate::error::Result;
use crate::models::{PriceSample, Watchlist};
use crate::price::{self, PriceError, PriceSource};

/// Drives poll cycles over the shared watchlist
pub struct Monitor {
    settings: MonitorConfig,
    watchlist: WatchlistHandle,
    source: Arc<dyn PriceSource>,
    store: Arc<dyn HistoryStore>,
    dispatcher: Dispatcher,
    evaluator: ThresholdEvaluator,
    restored: bool,
}

impl Monitor {
    /// Create a monitor from its collaborators
    pub fn new(
        settings: MonitorConfig,
        watchlist: WatchlistHandle,
        source: Arc<dyn PriceSource>,
        store: Arc<dyn HistoryStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            restored: !settings.restore_alert_state,
            settings,
            watchlist,
            source,
            store,
            dispatcher,
            evaluator: ThresholdEvaluator::new(),
        }
    }

    /// Build the configured price source and channels around `store`
    pub fn from_config(config: &Config, store: Arc<dyn HistoryStore>) -> Result<Self> {
        let watchlist = WatchlistHandle::new(config.watchlist()?);
        let source = price::from_config(&config.price_source)?;
        let dispatcher = Dispatcher::from_config(&config.notifications)?;

        Ok(Self::new(
            config.monitor.clone(),
            watchlist,
            source,
            store,
            dispatcher,
        ))
    }

    /// Handle for editing the watchlist while the monitor runs
    pub fn watchlist(&self) -> WatchlistHandle {
        self.watchlist.clone()
    }

    /// The price source this monitor polls
    pub fn price_source(&self) -> Arc<dyn PriceSource> {
        self.source.clone()
    }

    /// The dispatcher used for alerts and summaries
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run cycles on a fixed interval until `shutdown` is cancelled
    ///
    /// The first cycle starts immediately. A cycle that overruns the
    /// interval causes missed ticks to be skipped, never queued.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.settings.poll_interval_seconds,
            source = self.source.name(),
            "Monitor started"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = self.run_cycle().await;
            info!(
                fetched = report.prices.len(),
                unavailable = report.unavailable.len(),
                alerts = report.alerts.len(),
                persist_failures = report.persist_failures,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Cycle complete"
            );
        }

        info!("Monitor stopped");
        Ok(())
    }

    /// Run one complete poll cycle
    pub async fn run_cycle(&mut self) -> CycleReport {
        let clock = Instant::now();
        let watchlist = self.watchlist.snapshot();
        let mut report = CycleReport::new(Utc::now(), watchlist.version());

        debug!(version = watchlist.version(), symbols = watchlist.len(), "Cycle started");

        let forgotten = self.evaluator.retain_watched(&watchlist);
        if forgotten > 0 {
            debug!(forgotten, "Dropped alert state for removed symbols");
        }
        if !self.restored {
            self.restore_state(&watchlist).await;
            self.restored = true;
        }

        // Fetch
        for (symbol, outcome) in self.fetch_all(&watchlist).await {
            match outcome {
                Ok(price) => {
                    info!(symbol = %symbol, price, "Fetched price");
                    report.prices.push(PriceSample::new(symbol, price, Utc::now()));
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Price fetch failed, skipping this cycle");
                    report.unavailable.push(symbol);
                }
            }
        }

        // Persist before evaluating
        for sample in &report.prices {
            if let Err(e) = self.store.insert_price(sample).await {
                error!(symbol = %sample.symbol, error = %e, "Failed to persist price");
                report.persist_failures += 1;
            }
        }

        // Evaluate
        for sample in &report.prices {
            if let Some(thresholds) = watchlist.get(&sample.symbol) {
                report.alerts.extend(self.evaluator.evaluate(sample, thresholds));
            }
        }

        // Alerts go out one at a time, then get recorded
        for event in &report.alerts {
            let delivery = self.dispatcher.dispatch(&alert_notification(event)).await;
            if !delivery.delivered() {
                report.undelivered_alerts += 1;
            }
            if let Err(e) = self.store.insert_alert(event).await {
                error!(symbol = %event.symbol, kind = %event.kind, error = %e, "Failed to persist alert");
                report.persist_failures += 1;
            }
        }

        if !watchlist.is_empty() {
            let summary = summary_notification(&watchlist, report.started_at, |s| report.price_of(s));
            let delivery = self.dispatcher.dispatch(&summary).await;
            if !delivery.delivered() {
                debug!("Price summary reached no configured channel");
            }
            report.summary = Some(delivery);
        }

        report.elapsed = clock.elapsed();
        report
    }

    async fn fetch_all(&self, watchlist: &Watchlist) -> Vec<(String, std::result::Result<f64, PriceError>)> {
        let timeout = self.settings.fetch_timeout();
        let fetches = watchlist.symbols().map(|symbol| {
            let source = self.source.clone();
            async move {
                let outcome = match tokio::time::timeout(timeout, source.get_price(symbol)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(PriceError::Timeout(symbol.to_string())),
                };
                (symbol.to_string(), outcome)
            }
        });
        join_all(fetches).await
    }

    async fn restore_state(&mut self, watchlist: &Watchlist) {
        for (symbol, thresholds) in watchlist.iter() {
            match self.store.restore_alert_state(symbol, thresholds).await {
                Ok(state) => {
                    if state.above_armed || state.below_armed {
                        info!(symbol, ?state, "Restored alert state from history");
                    }
                    self.evaluator.restore(symbol, state);
                }
                Err(e) => {
                    warn!(symbol, error = %e, "Could not restore alert state, starting disarmed");
                }
            }
        }
    }
}

//! Outcome of one poll cycle

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::alerting::DispatchReport;
use crate::models::{AlertEvent, PriceSample};

/// What one poll cycle fetched, fired and delivered
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Wall-clock start of the cycle
    pub started_at: DateTime<Utc>,
    /// Watchlist snapshot the cycle ran against
    pub watchlist_version: u64,
    /// Successfully fetched samples, in watchlist order
    pub prices: Vec<PriceSample>,
    /// Symbols whose fetch failed this cycle
    pub unavailable: Vec<String>,
    /// Crossings detected, in evaluation order
    pub alerts: Vec<AlertEvent>,
    /// Alert dispatches that reached no configured channel
    pub undelivered_alerts: usize,
    /// History writes that failed
    pub persist_failures: usize,
    /// Summary delivery, absent when the watchlist was empty
    pub summary: Option<DispatchReport>,
    /// Time the cycle took, serialized as milliseconds
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl CycleReport {
    pub(crate) fn new(started_at: DateTime<Utc>, watchlist_version: u64) -> Self {
        Self {
            started_at,
            watchlist_version,
            prices: Vec::new(),
            unavailable: Vec::new(),
            alerts: Vec::new(),
            undelivered_alerts: 0,
            persist_failures: 0,
            summary: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Price fetched for `symbol` this cycle
    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        self.prices
            .iter()
            .find(|s| s.symbol == symbol)
            .map(|s| s.price)
    }

    /// Human-readable multi-line summary
    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "Cycle at {} (watchlist v{}, {} ms)",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.watchlist_version,
            self.elapsed.as_millis()
        )];

        for sample in &self.prices {
            lines.push(format!("  {:<8} ${:>10.2}", sample.symbol, sample.price));
        }
        for symbol in &self.unavailable {
            lines.push(format!("  {symbol:<8} unavailable"));
        }
        for alert in &self.alerts {
            lines.push(format!(
                "  ALERT {} {} at ${:.2} (threshold ${:.2})",
                alert.symbol, alert.kind, alert.price, alert.threshold
            ));
        }
        if self.persist_failures > 0 {
            lines.push(format!("  {} history writes failed", self.persist_failures));
        }
        if let Some(summary) = &self.summary {
            lines.push(format!(
                "  summary delivered to {}/{} channels",
                summary.succeeded, summary.attempted
            ));
        }

        lines.join("\n")
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}

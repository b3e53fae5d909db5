//! Threshold crossing evaluation with hysteresis

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::{AlertEvent, AlertKind, AlertState, PriceSample, ThresholdConfig, Watchlist};

/// Decide which crossings fire for one symbol on one sample
///
/// A bound counts as crossed when the price reaches it (`>=` upper, `<=`
/// lower). A direction fires only while disarmed and then arms; it disarms
/// once the price is strictly back on the safe side. A missing bound never
/// fires, arms or disarms. Both directions are evaluated independently, so
/// an inverted configuration can fire both at once; configurations are
/// validated before they get here.
pub fn evaluate(
    symbol: &str,
    price: f64,
    thresholds: &ThresholdConfig,
    state: AlertState,
    observed_at: DateTime<Utc>,
) -> (Vec<AlertEvent>, AlertState) {
    let mut next = state;
    let mut events = Vec::new();

    let checks = [
        (AlertKind::Upper, thresholds.upper, price >= thresholds.upper.unwrap_or(f64::INFINITY)),
        (AlertKind::Lower, thresholds.lower, price <= thresholds.lower.unwrap_or(f64::NEG_INFINITY)),
    ];

    for (kind, bound, crossed) in checks {
        let Some(threshold) = bound else { continue };

        if crossed {
            if !next.is_armed(kind) {
                events.push(AlertEvent {
                    symbol: symbol.to_string(),
                    kind,
                    price,
                    threshold,
                    fired_at: observed_at,
                });
                next.set_armed(kind, true);
            }
        } else {
            next.set_armed(kind, false);
        }
    }

    (events, next)
}

/// Owns the hysteresis state of every watched symbol
///
/// Only the task running the poll cycle holds this, so no locking is needed.
#[derive(Debug, Default)]
pub struct ThresholdEvaluator {
    states: HashMap<String, AlertState>,
}

impl ThresholdEvaluator {
    /// Create an evaluator with every symbol disarmed
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one sample, updating that symbol's state
    pub fn evaluate(&mut self, sample: &PriceSample, thresholds: &ThresholdConfig) -> Vec<AlertEvent> {
        let state = self.state(&sample.symbol);
        let (events, next) = evaluate(
            &sample.symbol,
            sample.price,
            thresholds,
            state,
            sample.observed_at,
        );

        if next != state {
            debug!(symbol = %sample.symbol, ?state, ?next, "Alert state changed");
        }
        for event in &events {
            info!(
                symbol = %event.symbol,
                kind = %event.kind,
                price = event.price,
                threshold = event.threshold,
                "Threshold crossed"
            );
        }

        self.states.insert(sample.symbol.clone(), next);
        events
    }

    /// Current state for a symbol; unknown symbols are disarmed
    pub fn state(&self, symbol: &str) -> AlertState {
        self.states.get(symbol).copied().unwrap_or_default()
    }

    /// Seed a symbol's state, e.g. from persisted history
    pub fn restore(&mut self, symbol: &str, state: AlertState) {
        self.states.insert(symbol.to_string(), state);
    }

    /// Forget symbols no longer on the watchlist so they re-enter disarmed
    pub fn retain_watched(&mut self, watchlist: &Watchlist) -> usize {
        let before = self.states.len();
        self.states.retain(|symbol, _| watchlist.contains(symbol));
        before - self.states.len()
    }
}

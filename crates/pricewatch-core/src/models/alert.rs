//! Alert data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Direction of a threshold crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertKind {
    /// Price reached or exceeded the upper bound
    Upper,
    /// Price reached or fell below the lower bound
    Lower,
}

impl AlertKind {
    /// Storage representation
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Upper => "UPPER",
            AlertKind::Lower => "LOWER",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UPPER" => Ok(AlertKind::Upper),
            "LOWER" => Ok(AlertKind::Lower),
            other => Err(Error::validation(format!("unknown alert kind '{other}'"))),
        }
    }
}

/// A newly detected threshold crossing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Ticker symbol
    pub symbol: String,

    /// Crossing direction
    pub kind: AlertKind,

    /// Price that crossed the bound
    pub price: f64,

    /// The bound that was crossed
    pub threshold: f64,

    /// When the crossing was detected
    pub fired_at: DateTime<Utc>,
}

impl AlertEvent {
    /// Distance past the threshold, positive in the direction of the crossing
    pub fn overshoot(&self) -> f64 {
        match self.kind {
            AlertKind::Upper => self.price - self.threshold,
            AlertKind::Lower => self.threshold - self.price,
        }
    }
}

/// Per-symbol hysteresis state
///
/// A direction is armed once its alert has fired and stays armed until the
/// price returns to the safe side of that bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    /// An UPPER alert fired and has not been cleared
    pub above_armed: bool,

    /// A LOWER alert fired and has not been cleared
    pub below_armed: bool,
}

impl AlertState {
    /// Whether the given direction is armed
    pub fn is_armed(&self, kind: AlertKind) -> bool {
        match kind {
            AlertKind::Upper => self.above_armed,
            AlertKind::Lower => self.below_armed,
        }
    }

    /// Set the flag for one direction
    pub fn set_armed(&mut self, kind: AlertKind, armed: bool) {
        match kind {
            AlertKind::Upper => self.above_armed = armed,
            AlertKind::Lower => self.below_armed = armed,
        }
    }
}

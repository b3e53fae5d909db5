//! Price sample models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed price for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Ticker symbol
    pub symbol: String,

    /// Observed price
    pub price: f64,

    /// When the price was observed
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    /// Create a new sample
    pub fn new(symbol: impl Into<String>, price: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            observed_at,
        }
    }
}

/// Price for one symbol as reported by a price source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol
    pub symbol: String,

    /// Quoted price, `None` when the source had nothing
    pub price: Option<f64>,
}

//! Randomized prices for demos and dry runs

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;

use super::{PriceError, PriceSource};

const DEFAULT_BASE: f64 = 100.0;
const JITTER: f64 = 10.0;

/// Returns a fixed base price per symbol plus uniform jitter of ±10
pub struct DemoPriceSource {
    base_prices: HashMap<&'static str, f64>,
}

impl DemoPriceSource {
    /// Create a demo source with the built-in base prices
    pub fn new() -> Self {
        let base_prices = HashMap::from([
            ("AAPL", 190.0),
            ("TSLA", 250.0),
            ("SPY", 470.0),
            ("NVDA", 140.0),
            ("BTC-USD", 95_000.0),
            ("LTC-USD", 110.0),
            ("BCH-USD", 450.0),
        ]);
        Self { base_prices }
    }

    fn base_price(&self, symbol: &str) -> f64 {
        self.base_prices.get(symbol).copied().unwrap_or(DEFAULT_BASE)
    }
}

impl Default for DemoPriceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for DemoPriceSource {
    fn name(&self) -> &str {
        "demo"
    }

    async fn get_price(&self, symbol: &str) -> Result<f64, PriceError> {
        let jitter = rand::thread_rng().gen_range(-JITTER..JITTER);
        Ok(self.base_price(symbol) + jitter)
    }
}

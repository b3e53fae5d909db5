//! Price sources
//!
//! The monitor only cares whether a fetch succeeded; retries and rate
//! limiting belong to the source.

mod demo;
mod yahoo;

pub use demo::DemoPriceSource;
pub use yahoo::YahooPriceSource;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{PriceSourceConfig, PriceSourceKind};
use crate::error::Result;

/// Price fetch errors
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    /// Transport failure talking to the quote API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the quote API
    #[error("{symbol}: quote API returned {status}: {body}")]
    Status {
        /// Symbol requested
        symbol: String,
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// The response carried no usable price for the symbol
    #[error("{0}: no price data available")]
    NoData(String),

    /// Zero, negative or non-finite price
    #[error("{symbol}: unusable price {price}")]
    InvalidPrice {
        /// Symbol requested
        symbol: String,
        /// Value the source reported
        price: f64,
    },

    /// The fetch exceeded the monitor's timeout
    #[error("{0}: timed out")]
    Timeout(String),
}

/// Something that can quote a current price for a symbol
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Current price for `symbol`
    async fn get_price(&self, symbol: &str) -> std::result::Result<f64, PriceError>;
}

/// Reject prices the evaluator must never see
pub(crate) fn ensure_usable(symbol: &str, price: f64) -> std::result::Result<f64, PriceError> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(PriceError::InvalidPrice {
            symbol: symbol.to_string(),
            price,
        })
    }
}

/// Build the configured price source
pub fn from_config(config: &PriceSourceConfig) -> Result<Arc<dyn PriceSource>> {
    let source: Arc<dyn PriceSource> = match config.kind {
        PriceSourceKind::Yahoo => Arc::new(YahooPriceSource::try_new(config)?),
        PriceSourceKind::Demo => Arc::new(DemoPriceSource::new()),
    };
    Ok(source)
}

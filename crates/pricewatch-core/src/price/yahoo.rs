//! Yahoo Finance chart API client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::PriceSourceConfig;
use crate::error::Result;

use super::{ensure_usable, PriceError, PriceSource};

const USER_AGENT: &str = concat!("pricewatch/", env!("CARGO_PKG_VERSION"));

/// Quotes the last one-minute close of the current trading day
pub struct YahooPriceSource {
    client: Client,
    base_url: String,
}

impl YahooPriceSource {
    /// Create a client for the configured endpoint
    pub fn try_new(config: &PriceSourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn get_price(&self, symbol: &str) -> std::result::Result<f64, PriceError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);

        let response = self
            .client
            .get(&url)
            .query(&[("range", "1d"), ("interval", "1m")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PriceError::Status {
                symbol: symbol.to_string(),
                status,
                body,
            });
        }

        let chart: ChartResponse = response.json().await?;
        let price = chart
            .latest_price()
            .ok_or_else(|| PriceError::NoData(symbol.to_string()))?;

        debug!(symbol, price, "Yahoo quote");
        ensure_usable(symbol, price)
    }
}

// Chart API response, only the fields we read
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartResponse {
    /// Last non-null close, falling back to the market price in the metadata
    fn latest_price(&self) -> Option<f64> {
        let result = self.chart.result.as_ref()?.first()?;

        let last_close = result
            .indicators
            .as_ref()
            .and_then(|i| i.quote.first())
            .and_then(|q| q.close.iter().rev().find_map(|c| *c));

        last_close.or_else(|| result.meta.as_ref()?.regular_market_price)
    }
}

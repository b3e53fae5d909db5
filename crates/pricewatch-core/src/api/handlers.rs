//! API handlers for the HTTP REST API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::db::{HistoryRepository, HistoryStore};
use crate::error::Error;
use crate::models::{normalize_symbol, AlertEvent, PriceSample, Quote, ThresholdConfig};
use crate::monitor::WatchlistHandle;
use crate::price::PriceSource;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 1000;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Watchlist shared with the monitor
    pub watchlist: WatchlistHandle,
    /// Price and alert history
    pub history: HistoryRepository,
    /// Source for live quotes
    pub prices: Arc<dyn PriceSource>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::PriceSource(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always "ok" when the server answers
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// One watched symbol
#[derive(Debug, Serialize, Deserialize)]
pub struct WatchlistEntry {
    /// Normalized ticker
    pub symbol: String,
    /// Upper bound, if set
    pub upper: Option<f64>,
    /// Lower bound, if set
    pub lower: Option<f64>,
}

/// Current watchlist snapshot
#[derive(Debug, Serialize, Deserialize)]
pub struct WatchlistResponse {
    /// Snapshot version
    pub version: u64,
    /// Entries in symbol order
    pub entries: Vec<WatchlistEntry>,
}

/// List watched symbols
pub async fn get_watchlist(State(state): State<AppState>) -> Json<WatchlistResponse> {
    let snapshot = state.watchlist.snapshot();
    Json(WatchlistResponse {
        version: snapshot.version(),
        entries: snapshot
            .iter()
            .map(|(symbol, t)| WatchlistEntry {
                symbol: symbol.to_string(),
                upper: t.upper,
                lower: t.lower,
            })
            .collect(),
    })
}

/// Watchlist edit response
#[derive(Debug, Serialize, Deserialize)]
pub struct WatchlistUpdateResponse {
    /// Symbol as stored
    pub symbol: String,
    /// Version the edit produced
    pub version: u64,
}

/// Add a symbol or replace its thresholds; applies from the next cycle
pub async fn put_watchlist_entry(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Json(thresholds): Json<ThresholdConfig>,
) -> ApiResult<WatchlistUpdateResponse> {
    let symbol = normalize_symbol(&symbol).map_err(error_response)?;
    let version = state
        .watchlist
        .upsert(&symbol, thresholds)
        .map_err(error_response)?;

    Ok(Json(WatchlistUpdateResponse { symbol, version }))
}

/// Stop watching a symbol; applies from the next cycle
pub async fn delete_watchlist_entry(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<WatchlistUpdateResponse> {
    let symbol = normalize_symbol(&symbol).map_err(error_response)?;
    let version = state.watchlist.remove(&symbol).map_err(error_response)?;

    Ok(Json(WatchlistUpdateResponse { symbol, version }))
}

/// Query parameters for history listings
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Restrict to one symbol
    pub symbol: Option<String>,
    /// Maximum rows, clamped to 1..=1000
    pub limit: Option<u32>,
}

impl HistoryQuery {
    fn symbol(&self) -> Result<Option<String>, (StatusCode, String)> {
        self.symbol
            .as_deref()
            .map(normalize_symbol)
            .transpose()
            .map_err(error_response)
    }

    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Recent prices response
#[derive(Serialize, Deserialize)]
pub struct PricesResponse {
    /// Samples, newest first
    pub prices: Vec<PriceSample>,
    /// Number of samples returned
    pub total: usize,
}

/// Recent prices, newest first
pub async fn list_prices(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<PricesResponse> {
    let symbol = query.symbol()?;
    let prices = state
        .history
        .recent_prices(symbol.as_deref(), query.limit())
        .await
        .map_err(error_response)?;

    let total = prices.len();
    Ok(Json(PricesResponse { prices, total }))
}

/// Most recent persisted price for a symbol
pub async fn latest_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<PriceSample> {
    let symbol = normalize_symbol(&symbol).map_err(error_response)?;
    state
        .history
        .latest_price(&symbol)
        .await
        .map_err(error_response)?
        .map(Json)
        .ok_or_else(|| error_response(Error::not_found("Price", symbol)))
}

/// Recent alerts response
#[derive(Serialize, Deserialize)]
pub struct AlertsResponse {
    /// Alerts, newest first
    pub alerts: Vec<AlertEvent>,
    /// Number of alerts returned
    pub total: usize,
}

/// Recent alerts, newest first
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<AlertsResponse> {
    let symbol = query.symbol()?;
    let alerts = state
        .history
        .recent_alerts(symbol.as_deref(), query.limit())
        .await
        .map_err(error_response)?;

    let total = alerts.len();
    Ok(Json(AlertsResponse { alerts, total }))
}

/// Live quote response
#[derive(Serialize, Deserialize)]
pub struct QuoteResponse {
    /// Symbol and price
    #[serde(flatten)]
    pub quote: Quote,
    /// Name of the price source asked
    pub source: String,
    /// When the quote was taken
    pub fetched_at: DateTime<Utc>,
}

/// Ask the price source directly, without persisting anything
pub async fn get_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<QuoteResponse> {
    let symbol = normalize_symbol(&symbol).map_err(error_response)?;

    let price = state.prices.get_price(&symbol).await.map_err(|e| {
        warn!(symbol = %symbol, error = %e, "Live quote failed");
        error_response(e.into())
    })?;

    Ok(Json(QuoteResponse {
        quote: Quote {
            symbol,
            price: Some(price),
        },
        source: state.prices.name().to_string(),
        fetched_at: Utc::now(),
    }))
}

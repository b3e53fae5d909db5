//! HTTP API driven through the router without a socket

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use pricewatch::api::{create_router, AppState};
use pricewatch::config::DatabaseConfig;
use pricewatch::db::{Database, HistoryRepository, HistoryStore};
use pricewatch::models::{AlertEvent, AlertKind, PriceSample, ThresholdConfig, Watchlist};
use pricewatch::monitor::WatchlistHandle;
use pricewatch::price::{DemoPriceSource, PriceError, PriceSource};

struct DownSource;

#[async_trait]
impl PriceSource for DownSource {
    fn name(&self) -> &str {
        "down"
    }

    async fn get_price(&self, symbol: &str) -> Result<f64, PriceError> {
        Err(PriceError::NoData(symbol.to_string()))
    }
}

async fn history() -> HistoryRepository {
    Database::connect(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
    .unwrap()
    .history()
}

fn watchlist() -> WatchlistHandle {
    WatchlistHandle::new(
        Watchlist::new([("AAPL", ThresholdConfig::new(Some(200.0), Some(175.0)))]).unwrap(),
    )
}

async fn app_with(prices: Arc<dyn PriceSource>) -> (Router, WatchlistHandle, HistoryRepository) {
    let handle = watchlist();
    let history = history().await;
    let router = create_router(AppState {
        watchlist: handle.clone(),
        history: history.clone(),
        prices,
    });
    (router, handle, history)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (app, _, _) = app_with(Arc::new(DemoPriceSource::new())).await;
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_watchlist_edits_are_versioned() {
    let (app, handle, _) = app_with(Arc::new(DemoPriceSource::new())).await;

    let (status, body) = call(
        &app,
        "PUT",
        "/api/v1/watchlist/tsla",
        Some(json!({ "upper": 300.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "symbol": "TSLA", "version": 2 }));

    let (status, body) = call(&app, "GET", "/api/v1/watchlist", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);
    assert_eq!(
        body["entries"],
        json!([
            { "symbol": "AAPL", "upper": 200.0, "lower": 175.0 },
            { "symbol": "TSLA", "upper": 300.0, "lower": null }
        ])
    );

    let (status, _) = call(&app, "DELETE", "/api/v1/watchlist/AAPL", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(handle.snapshot().version(), 3);
    assert!(!handle.snapshot().contains("AAPL"));
}

#[tokio::test]
async fn test_invalid_edits_are_rejected() {
    let (app, handle, _) = app_with(Arc::new(DemoPriceSource::new())).await;

    let (status, _) = call(
        &app,
        "PUT",
        "/api/v1/watchlist/AAPL",
        Some(json!({ "upper": 100.0, "lower": 150.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "DELETE", "/api/v1/watchlist/MSFT", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(handle.snapshot().version(), 1);
}

#[tokio::test]
async fn test_history_endpoints() {
    let (app, _, history) = app_with(Arc::new(DemoPriceSource::new())).await;
    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();

    history
        .insert_price(&PriceSample::new("AAPL", 199.0, t0))
        .await
        .unwrap();
    history
        .insert_price(&PriceSample::new("AAPL", 201.0, t0 + chrono::Duration::minutes(1)))
        .await
        .unwrap();
    history
        .insert_alert(&AlertEvent {
            symbol: "AAPL".to_string(),
            kind: AlertKind::Upper,
            price: 201.0,
            threshold: 200.0,
            fired_at: t0 + chrono::Duration::minutes(1),
        })
        .await
        .unwrap();

    let (status, body) = call(&app, "GET", "/api/v1/prices?symbol=aapl&limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["prices"][0]["price"], 201.0);

    let (status, body) = call(&app, "GET", "/api/v1/prices/AAPL/latest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], 201.0);

    let (status, _) = call(&app, "GET", "/api/v1/prices/TSLA/latest", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, "GET", "/api/v1/alerts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alerts"][0]["kind"], "UPPER");
}

#[tokio::test]
async fn test_live_quote() {
    let (app, _, _) = app_with(Arc::new(DemoPriceSource::new())).await;
    let (status, body) = call(&app, "GET", "/api/v1/quotes/aapl", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["source"], "demo");

    let (app, _, _) = app_with(Arc::new(DownSource)).await;
    let (status, body) = call(&app, "GET", "/api/v1/quotes/AAPL", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, "Price source error: AAPL: no price data available");
}

//! API routes

use axum::{
    routing::{get, put},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Watchlist
        .route("/api/v1/watchlist", get(handlers::get_watchlist))
        .route(
            "/api/v1/watchlist/:symbol",
            put(handlers::put_watchlist_entry).delete(handlers::delete_watchlist_entry),
        )

        // History
        .route("/api/v1/prices", get(handlers::list_prices))
        .route("/api/v1/prices/:symbol/latest", get(handlers::latest_price))
        .route("/api/v1/alerts", get(handlers::list_alerts))

        // Live quotes
        .route("/api/v1/quotes/:symbol", get(handlers::get_quote))

        .with_state(state)
}

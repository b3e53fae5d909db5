//! REST API implementation
//!
//! Watchlist management and history queries over HTTP. The API shares the
//! monitor's watchlist handle, so edits apply from the next poll cycle.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::HistoryRepository;
use crate::error::{Error, Result};
use crate::monitor::WatchlistHandle;
use crate::price::PriceSource;

/// HTTP API server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(
        watchlist: WatchlistHandle,
        history: HistoryRepository,
        prices: Arc<dyn PriceSource>,
    ) -> Self {
        Self {
            state: AppState {
                watchlist,
                history,
                prices,
            },
        }
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve(self, addr: &str, shutdown: CancellationToken) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = create_router(self.state)
            .layer(TraceLayer::new_for_http())
            .layer(cors);

        let listener = TcpListener::bind(addr).await?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}

//! Database layer for Pricewatch
//!
//! SQLite holds the append-only price and alert history.

mod sqlite;

pub use sqlite::{HistoryRepository, SqlitePool};

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{AlertEvent, AlertState, PriceSample, ThresholdConfig};

/// Database connections bundle
#[derive(Clone)]
pub struct Database {
    /// SQLite connection pool
    pub sqlite: SqlitePool,
}

impl Database {
    /// Open the database and run migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let sqlite = SqlitePool::new(config).await?;
        let db = Self { sqlite };
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        self.sqlite.migrate().await
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        self.sqlite.health_check().await
    }

    /// Repository over this database's history tables
    pub fn history(&self) -> HistoryRepository {
        HistoryRepository::new(&self.sqlite)
    }
}

/// Append-only price and alert history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record a fetched price
    async fn insert_price(&self, sample: &PriceSample) -> Result<()>;

    /// Record a fired alert
    async fn insert_alert(&self, event: &AlertEvent) -> Result<()>;

    /// Most recent prices, newest first
    async fn recent_prices(&self, symbol: Option<&str>, limit: u32) -> Result<Vec<PriceSample>>;

    /// Most recent alerts, newest first
    async fn recent_alerts(&self, symbol: Option<&str>, limit: u32) -> Result<Vec<AlertEvent>>;

    /// Rebuild the hysteresis state a symbol had before a restart
    async fn restore_alert_state(
        &self,
        _symbol: &str,
        _thresholds: &ThresholdConfig,
    ) -> Result<AlertState> {
        Ok(AlertState::default())
    }
}

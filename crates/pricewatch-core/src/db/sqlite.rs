//! SQLite connection and history queries

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{AlertEvent, AlertKind, AlertState, PriceSample, ThresholdConfig};

use super::HistoryStore;

/// SQLite connection pool
#[derive(Clone)]
pub struct SqlitePool {
    pool: sqlx::SqlitePool,
}

impl SqlitePool {
    /// Create a new SQLite connection pool, creating the file if needed
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let in_memory = config.url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        let pool = if in_memory {
            // Every connection to `:memory:` is a separate database; pin one.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new()
                .max_connections(config.max_connections.max(1))
                .connect_with(options)
                .await?
        };

        debug!(url = %config.url, "SQLite pool opened");
        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}

/// Repository for price and alert history
#[derive(Clone)]
pub struct HistoryRepository {
    pool: sqlx::SqlitePool,
}

impl HistoryRepository {
    /// Create a new history repository
    pub fn new(pool: &SqlitePool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }

    /// Latest persisted price for a symbol
    pub async fn latest_price(&self, symbol: &str) -> Result<Option<PriceSample>> {
        let row = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT ticker, fetched_at, price FROM price_history
            WHERE ticker = ?1
            ORDER BY fetched_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// When the last alert of `kind` fired for `symbol`
    async fn last_alert_at(&self, symbol: &str, kind: AlertKind) -> Result<Option<DateTime<Utc>>> {
        let fired_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT sent_at FROM alert_history
            WHERE ticker = ?1 AND alert_type = ?2
            ORDER BY sent_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(fired_at)
    }

    /// Whether any price since `since` sat on the safe side of `bound`
    async fn returned_to_safe_zone(
        &self,
        symbol: &str,
        kind: AlertKind,
        bound: f64,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let sql = match kind {
            AlertKind::Upper => {
                "SELECT COUNT(*) FROM price_history WHERE ticker = ?1 AND fetched_at >= ?2 AND price < ?3"
            }
            AlertKind::Lower => {
                "SELECT COUNT(*) FROM price_history WHERE ticker = ?1 AND fetched_at >= ?2 AND price > ?3"
            }
        };

        let safe_samples = sqlx::query_scalar::<_, i64>(sql)
            .bind(symbol)
            .bind(since)
            .bind(bound)
            .fetch_one(&self.pool)
            .await?;

        Ok(safe_samples > 0)
    }
}

#[async_trait]
impl HistoryStore for HistoryRepository {
    async fn insert_price(&self, sample: &PriceSample) -> Result<()> {
        sqlx::query("INSERT INTO price_history (ticker, fetched_at, price) VALUES (?1, ?2, ?3)")
            .bind(&sample.symbol)
            .bind(sample.observed_at)
            .bind(sample.price)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_alert(&self, event: &AlertEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alert_history (ticker, alert_type, price, threshold, sent_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&event.symbol)
        .bind(event.kind.as_str())
        .bind(event.price)
        .bind(event.threshold)
        .bind(event.fired_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_prices(&self, symbol: Option<&str>, limit: u32) -> Result<Vec<PriceSample>> {
        let rows = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT ticker, fetched_at, price FROM price_history
            WHERE ?1 IS NULL OR ticker = ?1
            ORDER BY fetched_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(symbol)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn recent_alerts(&self, symbol: Option<&str>, limit: u32) -> Result<Vec<AlertEvent>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT ticker, alert_type, price, threshold, sent_at FROM alert_history
            WHERE ?1 IS NULL OR ticker = ?1
            ORDER BY sent_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(symbol)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AlertEvent::try_from).collect()
    }

    async fn restore_alert_state(
        &self,
        symbol: &str,
        thresholds: &ThresholdConfig,
    ) -> Result<AlertState> {
        let mut state = AlertState::default();

        for (kind, bound) in [
            (AlertKind::Upper, thresholds.upper),
            (AlertKind::Lower, thresholds.lower),
        ] {
            let Some(bound) = bound else { continue };
            let Some(fired_at) = self.last_alert_at(symbol, kind).await? else {
                continue;
            };

            let cleared = self
                .returned_to_safe_zone(symbol, kind, bound, fired_at)
                .await?;
            state.set_armed(kind, !cleared);
        }

        debug!(symbol, ?state, "Restored alert state");
        Ok(state)
    }
}

#[derive(sqlx::FromRow)]
struct PriceRow {
    ticker: String,
    fetched_at: DateTime<Utc>,
    price: f64,
}

impl From<PriceRow> for PriceSample {
    fn from(row: PriceRow) -> Self {
        PriceSample {
            symbol: row.ticker,
            price: row.price,
            observed_at: row.fetched_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    ticker: String,
    alert_type: String,
    price: f64,
    threshold: f64,
    sent_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for AlertEvent {
    type Error = crate::error::Error;

    fn try_from(row: AlertRow) -> Result<Self> {
        Ok(AlertEvent {
            symbol: row.ticker,
            kind: row.alert_type.parse()?,
            price: row.price,
            threshold: row.threshold,
            fired_at: row.sent_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    async fn memory_repo() -> HistoryRepository {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        };
        Database::connect(&config).await.unwrap().history()
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 14, 30, 0).unwrap() + Duration::minutes(minute)
    }

    fn alert(symbol: &str, kind: AlertKind, price: f64, threshold: f64, minute: i64) -> AlertEvent {
        AlertEvent {
            symbol: symbol.to_string(),
            kind,
            price,
            threshold,
            fired_at: at(minute),
        }
    }

    #[tokio::test]
    async fn test_price_round_trip_with_limit_one() {
        let repo = memory_repo().await;
        repo.insert_price(&PriceSample::new("AAPL", 190.0, at(0))).await.unwrap();
        let written = PriceSample::new("AAPL", 201.25, at(1));
        repo.insert_price(&written).await.unwrap();

        let read = repo.recent_prices(Some("AAPL"), 1).await.unwrap();
        assert_eq!(read, vec![written]);
    }

    #[tokio::test]
    async fn test_recent_prices_newest_first_and_filtered() {
        let repo = memory_repo().await;
        repo.insert_price(&PriceSample::new("AAPL", 1.0, at(0))).await.unwrap();
        repo.insert_price(&PriceSample::new("TSLA", 2.0, at(1))).await.unwrap();
        repo.insert_price(&PriceSample::new("AAPL", 3.0, at(2))).await.unwrap();

        let all: Vec<f64> = repo
            .recent_prices(None, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.price)
            .collect();
        assert_eq!(all, vec![3.0, 2.0, 1.0]);

        let aapl = repo.recent_prices(Some("AAPL"), 10).await.unwrap();
        assert_eq!(aapl.len(), 2);
        assert!(aapl.iter().all(|s| s.symbol == "AAPL"));

        assert_eq!(repo.latest_price("TSLA").await.unwrap().map(|s| s.price), Some(2.0));
        assert!(repo.latest_price("NVDA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_alert_round_trip() {
        let repo = memory_repo().await;
        let event = alert("NVDA", AlertKind::Lower, 118.5, 120.0, 3);
        repo.insert_alert(&event).await.unwrap();

        let read = repo.recent_alerts(None, 5).await.unwrap();
        assert_eq!(read, vec![event]);
        assert!(repo.recent_alerts(Some("AAPL"), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_armed_while_price_stays_past_bound() {
        let repo = memory_repo().await;
        let thresholds = ThresholdConfig::new(Some(200.0), Some(175.0));

        repo.insert_price(&PriceSample::new("AAPL", 201.0, at(0))).await.unwrap();
        repo.insert_alert(&alert("AAPL", AlertKind::Upper, 201.0, 200.0, 0)).await.unwrap();
        repo.insert_price(&PriceSample::new("AAPL", 205.0, at(1))).await.unwrap();

        let state = repo.restore_alert_state("AAPL", &thresholds).await.unwrap();
        assert_eq!(
            state,
            AlertState {
                above_armed: true,
                below_armed: false
            }
        );
    }

    #[tokio::test]
    async fn test_restore_disarmed_after_return_to_safe_zone() {
        let repo = memory_repo().await;
        let thresholds = ThresholdConfig::new(Some(200.0), None);

        repo.insert_price(&PriceSample::new("AAPL", 201.0, at(0))).await.unwrap();
        repo.insert_alert(&alert("AAPL", AlertKind::Upper, 201.0, 200.0, 0)).await.unwrap();
        repo.insert_price(&PriceSample::new("AAPL", 199.0, at(1))).await.unwrap();
        repo.insert_price(&PriceSample::new("AAPL", 202.0, at(2))).await.unwrap();

        let state = repo.restore_alert_state("AAPL", &thresholds).await.unwrap();
        assert_eq!(state, AlertState::default());
    }

    #[tokio::test]
    async fn test_restore_ignores_unconfigured_or_raised_bounds() {
        let repo = memory_repo().await;

        repo.insert_price(&PriceSample::new("TSLA", 170.0, at(0))).await.unwrap();
        repo.insert_alert(&alert("TSLA", AlertKind::Lower, 170.0, 175.0, 0)).await.unwrap();

        let no_lower = ThresholdConfig::new(Some(300.0), None);
        assert_eq!(
            repo.restore_alert_state("TSLA", &no_lower).await.unwrap(),
            AlertState::default()
        );

        // The bound moved below the last price, so that price is now safe.
        let lowered = ThresholdConfig::new(None, Some(160.0));
        assert_eq!(
            repo.restore_alert_state("TSLA", &lowered).await.unwrap(),
            AlertState::default()
        );
    }
}

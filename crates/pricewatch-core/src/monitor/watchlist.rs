//! Shared, versioned watchlist

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{ThresholdConfig, Watchlist};

/// Publishes watchlist snapshots to the monitor and the API
///
/// Edits build a new snapshot from the current one and swap it in
/// atomically; readers holding an older snapshot are unaffected.
#[derive(Clone)]
pub struct WatchlistHandle {
    tx: Arc<watch::Sender<Arc<Watchlist>>>,
}

impl WatchlistHandle {
    /// Start publishing from `initial`
    pub fn new(initial: Watchlist) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Watchlist> {
        self.tx.borrow().clone()
    }

    /// Add a symbol or replace its thresholds, returning the new version
    pub fn upsert(&self, symbol: &str, thresholds: ThresholdConfig) -> Result<u64> {
        self.apply(|current| current.with_entry(symbol, thresholds))
    }

    /// Remove a symbol, returning the new version
    pub fn remove(&self, symbol: &str) -> Result<u64> {
        self.apply(|current| current.without(symbol))
    }

    fn apply<F>(&self, edit: F) -> Result<u64>
    where
        F: FnOnce(&Watchlist) -> Result<Watchlist>,
    {
        let mut outcome: Result<u64> = Err(Error::internal("watchlist edit did not run"));

        self.tx.send_if_modified(|current| match edit(&**current) {
            Ok(next) => {
                outcome = Ok(next.version());
                *current = Arc::new(next);
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });

        let version = outcome?;
        info!(version, symbols = self.snapshot().len(), "Watchlist updated");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn handle() -> WatchlistHandle {
        WatchlistHandle::new(
            Watchlist::new([("AAPL", ThresholdConfig::new(Some(200.0), Some(175.0)))]).unwrap(),
        )
    }

    #[test]
    fn test_edits_bump_version() {
        let handle = handle();
        let before = handle.snapshot();

        assert_eq!(handle.upsert("tsla", ThresholdConfig::new(Some(300.0), None)).unwrap(), 2);
        assert_eq!(handle.remove("AAPL").unwrap(), 3);

        let after = handle.snapshot();
        assert_eq!(after.symbols().collect::<Vec<_>>(), vec!["TSLA"]);
        // Older snapshots are untouched.
        assert_eq!(before.version(), 1);
        assert!(before.contains("AAPL"));
    }

    #[test]
    fn test_rejected_edit_keeps_version() {
        let handle = handle();

        let err = handle
            .upsert("AAPL", ThresholdConfig::new(Some(100.0), Some(150.0)))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
        assert!(matches!(handle.remove("MSFT"), Err(Error::NotFound { .. })));
        assert_eq!(handle.snapshot().version(), 1);
    }
}

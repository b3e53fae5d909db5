//! Watchlist and per-symbol threshold configuration

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

static SYMBOL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9.\-=^]{1,10}$").expect("symbol pattern is valid"));

/// Normalize and validate a ticker symbol
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim().to_ascii_uppercase();
    if !SYMBOL_PATTERN.is_match(&symbol) {
        return Err(Error::validation(format!("invalid ticker symbol '{raw}'")));
    }
    Ok(symbol)
}

/// Upper and lower bounds for one symbol
///
/// Either bound may be absent, in which case no alert fires in that direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Alert when the price reaches or exceeds this value
    #[serde(default)]
    pub upper: Option<f64>,

    /// Alert when the price reaches or falls below this value
    #[serde(default)]
    pub lower: Option<f64>,
}

impl ThresholdConfig {
    /// Create a threshold configuration
    pub fn new(upper: Option<f64>, lower: Option<f64>) -> Self {
        Self { upper, lower }
    }

    /// Reject non-positive bounds and `upper <= lower`
    pub fn validate(&self) -> Result<()> {
        for (name, bound) in [("upper", self.upper), ("lower", self.lower)] {
            if let Some(value) = bound {
                if !value.is_finite() || value <= 0.0 {
                    return Err(Error::validation(format!(
                        "{name} threshold must be a positive number, got {value}"
                    )));
                }
            }
        }

        if let (Some(upper), Some(lower)) = (self.upper, self.lower) {
            if upper <= lower {
                return Err(Error::validation(format!(
                    "upper threshold ({upper}) must be greater than lower threshold ({lower})"
                )));
            }
        }

        Ok(())
    }
}

/// An immutable, versioned set of watched symbols
///
/// Edits produce a new snapshot with a higher version; the poll cycle reads
/// one snapshot at its start and never sees a change mid-cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    version: u64,
    entries: BTreeMap<String, ThresholdConfig>,
}

impl Watchlist {
    /// Build version 1 from raw entries, normalizing and validating each
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ThresholdConfig)>,
        S: AsRef<str>,
    {
        let mut normalized = BTreeMap::new();
        for (raw, thresholds) in entries {
            let symbol = normalize_symbol(raw.as_ref())?;
            thresholds
                .validate()
                .map_err(|e| Error::validation(format!("{symbol}: {e}")))?;
            if normalized.insert(symbol.clone(), thresholds).is_some() {
                return Err(Error::validation(format!("duplicate symbol '{symbol}'")));
            }
        }

        Ok(Self {
            version: 1,
            entries: normalized,
        })
    }

    /// Snapshot version
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Thresholds for a symbol
    pub fn get(&self, symbol: &str) -> Option<&ThresholdConfig> {
        self.entries.get(symbol)
    }

    /// Whether the symbol is watched
    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    /// Symbols in display order
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in display order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ThresholdConfig)> {
        self.entries.iter().map(|(s, t)| (s.as_str(), t))
    }

    /// Number of watched symbols
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is watched
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// New snapshot with `symbol` added or its thresholds replaced
    pub fn with_entry(&self, symbol: &str, thresholds: ThresholdConfig) -> Result<Self> {
        let symbol = normalize_symbol(symbol)?;
        thresholds.validate()?;

        let mut entries = self.entries.clone();
        entries.insert(symbol, thresholds);

        Ok(Self {
            version: self.version + 1,
            entries,
        })
    }

    /// New snapshot with `symbol` removed
    pub fn without(&self, symbol: &str) -> Result<Self> {
        let symbol = normalize_symbol(symbol)?;
        if !self.entries.contains_key(&symbol) {
            return Err(Error::not_found("Watchlist entry", symbol));
        }

        let mut entries = self.entries.clone();
        entries.remove(&symbol);

        Ok(Self {
            version: self.version + 1,
            entries,
        })
    }
}

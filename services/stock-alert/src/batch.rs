//! Paced batch recompute.
//!
//! Walks the watch-list in order and revalues every stock of the requested
//! market, one fetch sequence at a time with a minimum spacing between
//! attempts. A failing ticker is logged and skipped; its previous values
//! stay in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use stock_common::config::FetchConfig;
use tracing::{info, warn};

use crate::data::{RateLimiter, SharedRateLimiter};
use crate::market::Market;
use crate::valuation::{Thresholds, Valuator};
use crate::watchlist::Watchlist;

/// Which stocks a cycle covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketFilter {
    #[serde(alias = "ch")]
    Domestic,
    #[serde(alias = "us")]
    Foreign,
    #[default]
    #[serde(alias = "chus")]
    All,
}

impl MarketFilter {
    pub fn matches(&self, market: Market) -> bool {
        match self {
            Self::Domestic => market == Market::Domestic,
            Self::Foreign => market == Market::Foreign,
            Self::All => true,
        }
    }

    /// Markets covered by this filter.
    pub fn markets(&self) -> &'static [Market] {
        match self {
            Self::Domestic => &[Market::Domestic],
            Self::Foreign => &[Market::Foreign],
            Self::All => &[Market::Domestic, Market::Foreign],
        }
    }
}

impl From<Market> for MarketFilter {
    fn from(market: Market) -> Self {
        match market {
            Market::Domestic => Self::Domestic,
            Market::Foreign => Self::Foreign,
        }
    }
}

impl fmt::Display for MarketFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domestic => write!(f, "domestic"),
            Self::Foreign => write!(f, "foreign"),
            Self::All => write!(f, "all"),
        }
    }
}

/// A ticker whose valuation failed during a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FailedTicker {
    pub ticker: String,
    pub error: String,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub filter: MarketFilter,
    pub started_at: DateTime<Utc>,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedTicker>,
}

/// Revalues the watch-list one stock at a time.
pub struct BatchRecomputer {
    valuator: Arc<Valuator>,
    limiter: SharedRateLimiter,
}

impl BatchRecomputer {
    pub fn new(valuator: Arc<Valuator>, limiter: SharedRateLimiter) -> Self {
        Self { valuator, limiter }
    }

    /// Create a recomputer paced by `fetch.interval_ms`.
    pub fn from_config(valuator: Arc<Valuator>, fetch: &FetchConfig) -> Self {
        Self::new(
            valuator,
            Arc::new(RateLimiter::from_millis("fetch", fetch.interval_ms)),
        )
    }

    /// The pacing shared with any other fetcher of the same sites.
    pub fn limiter(&self) -> SharedRateLimiter {
        Arc::clone(&self.limiter)
    }

    /// Recompute every stock matching `filter`.
    ///
    /// The caller holds the watch-list guard for the whole walk. The
    /// per-market timestamps are set to the start time before the first
    /// fetch.
    pub async fn run(
        &self,
        watchlist: &mut Watchlist,
        filter: MarketFilter,
        thresholds: &Thresholds,
    ) -> BatchReport {
        let started_at = Utc::now();
        for market in filter.markets() {
            watchlist.mark_recomputed(*market, started_at);
        }

        let mut report = BatchReport {
            filter,
            started_at,
            attempted: 0,
            succeeded: 0,
            failed: Vec::new(),
        };

        for stock in watchlist.stocks_mut() {
            if !filter.matches(stock.market) {
                continue;
            }

            self.limiter.acquire().await;
            report.attempted += 1;

            match self.valuator.compute_value(stock, thresholds).await {
                Ok(band) => {
                    report.succeeded += 1;
                    tracing::debug!(
                        ticker = %stock.ticker,
                        value = ?stock.value,
                        band = band.label(),
                        "Stock revalued"
                    );
                }
                Err(e) => {
                    warn!(ticker = %stock.ticker, error = %e, "Valuation failed, keeping previous values");
                    report.failed.push(FailedTicker {
                        ticker: stock.ticker.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            filter = %filter,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
            "Batch recompute finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        assert!(MarketFilter::Domestic.matches(Market::Domestic));
        assert!(!MarketFilter::Domestic.matches(Market::Foreign));
        assert!(MarketFilter::Foreign.matches(Market::Foreign));
        assert!(MarketFilter::All.matches(Market::Domestic));
        assert_eq!(MarketFilter::All.markets().len(), 2);
    }

    #[test]
    fn test_filter_accepts_legacy_tags() {
        let parsed: MarketFilter = serde_json::from_str("\"ch\"").unwrap();
        assert_eq!(parsed, MarketFilter::Domestic);
        let parsed: MarketFilter = serde_json::from_str("\"chus\"").unwrap();
        assert_eq!(parsed, MarketFilter::All);
        let parsed: MarketFilter = serde_json::from_str("\"foreign\"").unwrap();
        assert_eq!(parsed, MarketFilter::Foreign);
    }
}

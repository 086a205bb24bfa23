//! The watch-list and its single-flight guard.
//!
//! Exactly one logical operation holds the list at a time: a full batch
//! recompute (with its digest selection) or a single administrative edit.
//! Others wait on the guard; nothing observes a half-walked list.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use stock_common::config::StockRecord;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::MutationError;
use crate::market::Market;
use crate::valuation::Stock;

/// Ordered watch-list plus per-market recompute bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    stocks: Vec<Stock>,
    last_recompute: HashMap<Market, DateTime<Utc>>,
}

impl Watchlist {
    pub fn new(stocks: Vec<Stock>) -> Self {
        Self {
            stocks,
            last_recompute: HashMap::new(),
        }
    }

    /// Build from persisted records. Records with an empty ticker are
    /// dropped with a warning.
    pub fn from_records(records: &[StockRecord]) -> Self {
        let stocks = records
            .iter()
            .filter_map(|record| match Stock::from_record(record) {
                Ok(stock) => Some(stock),
                Err(e) => {
                    tracing::warn!(ticker = %record.ticker, error = %e, "Dropping unusable record");
                    None
                }
            })
            .collect();

        Self::new(stocks)
    }

    /// Records in display order, for persistence.
    pub fn records(&self) -> Vec<StockRecord> {
        self.stocks.iter().map(Stock::to_record).collect()
    }

    pub fn stocks(&self) -> &[Stock] {
        &self.stocks
    }

    pub fn stocks_mut(&mut self) -> &mut [Stock] {
        &mut self.stocks
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    pub fn position(&self, ticker: &str) -> Option<usize> {
        self.stocks.iter().position(|s| s.ticker == ticker)
    }

    pub fn get(&self, ticker: &str) -> Option<&Stock> {
        self.stocks.iter().find(|s| s.ticker == ticker)
    }

    pub fn get_mut(&mut self, ticker: &str) -> Option<&mut Stock> {
        self.stocks.iter_mut().find(|s| s.ticker == ticker)
    }

    /// Append a stock. Rejects duplicates.
    pub fn push(&mut self, stock: Stock) -> Result<(), MutationError> {
        if let Some(existing) = self.get(&stock.ticker) {
            return Err(MutationError::Duplicate {
                ticker: stock.ticker.clone(),
                name: existing.name.clone(),
            });
        }
        self.stocks.push(stock);
        Ok(())
    }

    /// Remove a stock by ticker.
    pub fn remove(&mut self, ticker: &str) -> Result<Stock, MutationError> {
        let index = self
            .position(ticker)
            .ok_or_else(|| MutationError::NotFound(ticker.to_string()))?;
        Ok(self.stocks.remove(index))
    }

    /// Cut the stock at 1-based position `from` and reinsert it at `to`,
    /// counted in the list without it. Moving to the last position appends.
    pub fn reposition(&mut self, from: usize, to: usize) -> Result<&Stock, MutationError> {
        let len = self.stocks.len();
        for index in [from, to] {
            if index < 1 || index > len {
                return Err(MutationError::OutOfRange { index, len });
            }
        }

        let stock = self.stocks.remove(from - 1);
        self.stocks.insert(to - 1, stock);
        Ok(&self.stocks[to - 1])
    }

    /// Record that `market` was recomputed at `at`.
    pub fn mark_recomputed(&mut self, market: Market, at: DateTime<Utc>) {
        self.last_recompute.insert(market, at);
    }

    /// Start time of the last recompute for `market`.
    pub fn last_recompute(&self, market: Market) -> Option<DateTime<Utc>> {
        self.last_recompute.get(&market).copied()
    }
}

/// Parse a move command of the form `"i>j"`.
pub fn parse_move_command(command: &str) -> Result<(usize, usize), MutationError> {
    let invalid = |reason: String| MutationError::InvalidCommand {
        command: command.to_string(),
        reason,
    };

    let (from, to) = command
        .split_once('>')
        .ok_or_else(|| invalid("格式应为 序号>序号".to_string()))?;

    let parse = |raw: &str| {
        raw.trim()
            .parse::<usize>()
            .map_err(|e| invalid(format!("{:?} {}", raw.trim(), e)))
    };

    Ok((parse(from)?, parse(to)?))
}

// ============================================================================
// Single-flight guard
// ============================================================================

/// Handle to the one shared watch-list.
#[derive(Debug, Clone, Default)]
pub struct SharedWatchlist {
    inner: Arc<Mutex<Watchlist>>,
}

impl SharedWatchlist {
    pub fn new(watchlist: Watchlist) -> Self {
        Self {
            inner: Arc::new(Mutex::new(watchlist)),
        }
    }

    /// Begin a transaction over the list, waiting for any current holder.
    pub async fn lock(&self) -> MutexGuard<'_, Watchlist> {
        self.inner.lock().await
    }

    /// Begin a transaction only if the list is free.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Watchlist>> {
        self.inner.try_lock().ok()
    }

    /// Copy of the current list, taken under the guard.
    pub async fn snapshot(&self) -> Watchlist {
        self.inner.lock().await.clone()
    }
}

//! Administrative edits of the watch-list.
//!
//! Each operation takes the watch-list guard for its whole duration, so an
//! edit arriving during a batch recompute waits for the batch to finish.
//! Every successful edit is persisted before the guard is released; a
//! failed save is reported in the result message and the in-memory edit
//! stands.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stock_common::store::ConfigStore;
use tracing::{info, warn};

use crate::data::SharedRateLimiter;
use crate::error::{MutationError, PersistenceError};
use crate::market::{classify, normalize_ticker};
use crate::valuation::{Stock, Thresholds, Valuator};
use crate::watchlist::{parse_move_command, SharedWatchlist, Watchlist};

/// Per-ticker edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationMode {
    #[serde(alias = "new")]
    Add,
    #[serde(alias = "alertmail")]
    ToggleAlert,
    #[serde(alias = "del")]
    Delete,
}

/// Outcome shown to the administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultMessage {
    pub success: bool,
    pub message: String,
    /// Whether the edit reached the config store
    pub persisted: bool,
    #[serde(skip)]
    pub status: u16,
}

impl ResultMessage {
    fn failed(error: MutationError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            persisted: false,
            status: error.status_code(),
        }
    }
}

/// Guarded add / toggle / delete / reposition.
pub struct WatchlistMutator {
    watchlist: SharedWatchlist,
    valuator: Arc<Valuator>,
    /// Same pacing as the batch recompute
    limiter: SharedRateLimiter,
    store: Arc<dyn ConfigStore>,
    thresholds: Thresholds,
}

impl WatchlistMutator {
    pub fn new(
        watchlist: SharedWatchlist,
        valuator: Arc<Valuator>,
        limiter: SharedRateLimiter,
        store: Arc<dyn ConfigStore>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            watchlist,
            valuator,
            limiter,
            store,
            thresholds,
        }
    }

    /// Add, toggle or delete one ticker.
    pub async fn apply(&self, ticker: &str, mode: MutationMode) -> ResultMessage {
        let ticker = normalize_ticker(ticker);
        let mut watchlist = self.watchlist.lock().await;

        let outcome = match mode {
            MutationMode::Add => self.add(&mut watchlist, &ticker).await,
            MutationMode::ToggleAlert => toggle_alert(&mut watchlist, &ticker),
            MutationMode::Delete => delete(&mut watchlist, &ticker),
        };

        match outcome {
            Ok(message) => {
                info!(ticker = %ticker, mode = ?mode, "Watch-list updated");
                self.persist(&watchlist, message)
            }
            Err(e) => {
                warn!(ticker = %ticker, mode = ?mode, error = %e, "Watch-list edit rejected");
                ResultMessage::failed(e)
            }
        }
    }

    /// Move the stock at 1-based `from` to 1-based `to`.
    pub async fn reposition(&self, from: usize, to: usize) -> ResultMessage {
        let mut watchlist = self.watchlist.lock().await;

        match watchlist.reposition(from, to) {
            Ok(stock) => {
                let message = format!("序号 {} {} 移动至 {}", from, stock.name, to);
                info!(from, to, ticker = %stock.ticker, "Watch-list reordered");
                self.persist(&watchlist, message)
            }
            Err(e) => {
                warn!(from, to, error = %e, "Reposition rejected");
                ResultMessage::failed(e)
            }
        }
    }

    /// Reposition from an `"i>j"` command.
    pub async fn move_command(&self, command: &str) -> ResultMessage {
        match parse_move_command(command) {
            Ok((from, to)) => self.reposition(from, to).await,
            Err(e) => ResultMessage::failed(e),
        }
    }

    async fn add(&self, watchlist: &mut Watchlist, ticker: &str) -> Result<String, MutationError> {
        classify(ticker).map_err(|_| MutationError::InvalidTicker(ticker.to_string()))?;

        if let Some(existing) = watchlist.get(ticker) {
            return Err(MutationError::Duplicate {
                ticker: ticker.to_string(),
                name: existing.name.clone(),
            });
        }

        let mut stock =
            Stock::new(ticker).map_err(|_| MutationError::InvalidTicker(ticker.to_string()))?;
        self.limiter.acquire().await;
        self.valuator
            .compute_value(&mut stock, &self.thresholds)
            .await
            .map_err(|source| MutationError::Valuation {
                ticker: ticker.to_string(),
                source,
            })?;

        let message = format!("{} {} 添加成功", stock.ticker, stock.name);
        watchlist.push(stock)?;
        Ok(message)
    }

    fn persist(&self, watchlist: &Watchlist, message: String) -> ResultMessage {
        match self
            .store
            .save_stocks(&watchlist.records())
            .map_err(PersistenceError::from)
        {
            Ok(()) => ResultMessage {
                success: true,
                message,
                persisted: true,
                status: 200,
            },
            Err(e) => {
                warn!(error = %e, "Watch-list edit applied but not persisted");
                ResultMessage {
                    success: true,
                    message: format!("{}；{}", message, e),
                    persisted: false,
                    status: 200,
                }
            }
        }
    }
}

fn toggle_alert(watchlist: &mut Watchlist, ticker: &str) -> Result<String, MutationError> {
    let stock = watchlist
        .get_mut(ticker)
        .ok_or_else(|| MutationError::NotFound(ticker.to_string()))?;

    stock.alert_enabled = !stock.alert_enabled;
    let state = if stock.alert_enabled {
        "开启邮件提醒"
    } else {
        "关闭邮件提醒"
    };

    Ok(format!("{} {} {}", stock.ticker, stock.name, state))
}

fn delete(watchlist: &mut Watchlist, ticker: &str) -> Result<String, MutationError> {
    let removed = watchlist.remove(ticker)?;
    Ok(format!("{} {} 已删除", removed.ticker, removed.name))
}

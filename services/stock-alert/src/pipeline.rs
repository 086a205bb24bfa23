//! One alert cycle: recompute, select, persist, mail.
//!
//! The recompute and the digest selection run under the watch-list guard
//! so the stamped `last_alert_at` values belong to the same list state the
//! mail describes. Mail goes out after the guard is released.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use stock_common::store::ConfigStore;

use crate::alert::AlertDeduper;
use crate::batch::{BatchRecomputer, BatchReport, MarketFilter};
use crate::error::PersistenceError;
use crate::notification::DigestNotifier;
use crate::valuation::Thresholds;
use crate::watchlist::SharedWatchlist;

/// Outcome of one full cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub batch: BatchReport,
    /// Tickers included in the digest
    pub alerted: Vec<String>,
    pub mail_sent: bool,
    pub finished_at: DateTime<Utc>,
}

/// Drives recompute and alerting over the shared watch-list.
pub struct AlertPipeline {
    watchlist: SharedWatchlist,
    recomputer: BatchRecomputer,
    deduper: AlertDeduper,
    notifier: DigestNotifier,
    store: Arc<dyn ConfigStore>,
    thresholds: Thresholds,
}

impl AlertPipeline {
    pub fn new(
        watchlist: SharedWatchlist,
        recomputer: BatchRecomputer,
        deduper: AlertDeduper,
        notifier: DigestNotifier,
        store: Arc<dyn ConfigStore>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            watchlist,
            recomputer,
            deduper,
            notifier,
            store,
            thresholds,
        }
    }

    pub fn notifier(&self) -> &DigestNotifier {
        &self.notifier
    }

    /// Recompute `filter`'s stocks, then mail the due ones.
    pub async fn run_cycle(&self, filter: MarketFilter) -> CycleReport {
        let (batch, digest) = {
            let mut watchlist = self.watchlist.lock().await;
            let batch = self
                .recomputer
                .run(&mut watchlist, filter, &self.thresholds)
                .await;
            let digest = self
                .deduper
                .collect(watchlist.stocks_mut(), Utc::now(), filter);

            if !digest.is_empty() {
                if let Err(e) = self
                    .store
                    .save_stocks(&watchlist.records())
                    .map_err(PersistenceError::from)
                {
                    tracing::error!(error = %e, "Failed to persist alert timestamps");
                }
            }

            (batch, digest)
        };

        let mail_sent = self.notifier.notify(&digest).await;

        CycleReport {
            batch,
            alerted: digest.touched,
            mail_sent,
            finished_at: Utc::now(),
        }
    }

    /// Recompute without selecting or mailing anything.
    pub async fn recompute_only(&self, filter: MarketFilter) -> BatchReport {
        let mut watchlist = self.watchlist.lock().await;
        self.recomputer
            .run(&mut watchlist, filter, &self.thresholds)
            .await
    }
}

//! Stock Alert Library
//!
//! Periodically revalues a watch-list of domestic (Shanghai / Shenzhen) and
//! foreign (US) stocks from scraped public pages and mails a digest of the
//! ones that look under- or overvalued.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    stock-alert (Rust Service)                        │
//! │                           :4435                                      │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐      │
//! │  │  Scheduler      │─▶│  Batch          │─▶│  Alert Deduper  │─▶ SMTP│
//! │  │  (3 crons)      │  │  Recomputer     │  │  + Digest       │      │
//! │  └─────────────────┘  └────────┬────────┘  └─────────────────┘      │
//! │  ┌─────────────────┐           │ Valuator                            │
//! │  │  Admin API      │─▶ Mutator │ ├─ Tencent / Jisilu / Eniu (CN)    │
//! │  └─────────────────┘           │ └─ Yahoo statistics (US)           │
//! │            single-flight guard over the shared watch-list            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Valuation
//!
//! `value = PE / ROE`. Below `alert.low` is undervalued (低估), above
//! `alert.high` overvalued (高估). A stock is mailed at most once per
//! `alert.alert_interval_minutes`.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod alert;
pub mod batch;
pub mod data;
pub mod error;
pub mod market;
pub mod mutator;
pub mod notification;
pub mod pipeline;
pub mod routes;
pub mod scheduler;
pub mod valuation;
pub mod watchlist;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use stock_common::config::Config;
use stock_common::store::ConfigStore;

use crate::alert::AlertDeduper;
use crate::batch::{BatchRecomputer, MarketFilter};
use crate::data::HtmlTransport;
use crate::mutator::WatchlistMutator;
use crate::notification::{smtp_sender, DigestNotifier, MailSender};
use crate::pipeline::AlertPipeline;
use crate::scheduler::AlertScheduler;
use crate::valuation::{Thresholds, Valuator};
use crate::watchlist::{SharedWatchlist, Watchlist};

/// Alert service state
pub struct AlertState {
    /// Configuration as loaded at start-up
    pub config: Config,
    /// The shared watch-list
    pub watchlist: SharedWatchlist,
    /// Recompute and digest pipeline
    pub pipeline: Arc<AlertPipeline>,
    /// Administrative edits
    pub mutator: Arc<WatchlistMutator>,
    /// Cron scheduler
    pub scheduler: Arc<AlertScheduler>,
    pub started_at: DateTime<Utc>,
}

impl AlertState {
    /// Wire the state from explicit collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn ConfigStore>,
        valuator: Arc<Valuator>,
        mailer: Option<Arc<dyn MailSender>>,
    ) -> Result<Self> {
        let thresholds = Thresholds::from(&config.alert);
        let watchlist = SharedWatchlist::new(Watchlist::from_records(&config.stocks));

        let recomputer = BatchRecomputer::from_config(Arc::clone(&valuator), &config.fetch);
        let limiter = recomputer.limiter();

        let pipeline = Arc::new(AlertPipeline::new(
            watchlist.clone(),
            recomputer,
            AlertDeduper::new(config.alert.alert_interval_minutes),
            DigestNotifier::new(mailer, config.alert.mails.clone()),
            Arc::clone(&store),
            thresholds,
        ));

        let mutator = Arc::new(WatchlistMutator::new(
            watchlist.clone(),
            valuator,
            limiter,
            store,
            thresholds,
        ));

        let scheduler = Arc::new(AlertScheduler::new(&config.alert, Arc::clone(&pipeline))?);

        Ok(Self {
            config,
            watchlist,
            pipeline,
            mutator,
            scheduler,
            started_at: Utc::now(),
        })
    }

    /// Wire the state against the live sources and SMTP.
    pub fn from_config(config: Config, store: Arc<dyn ConfigStore>) -> Result<Self> {
        let transport = HtmlTransport::new(&config.fetch)?;
        let valuator = Arc::new(Valuator::with_transport(Arc::new(transport)));
        let mailer = smtp_sender(&config.smtp);

        Self::new(config, store, valuator, mailer)
    }
}

/// Main alert service
pub struct AlertService {
    state: Arc<AlertState>,
}

impl AlertService {
    pub fn new(state: AlertState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> &Arc<AlertState> {
        &self.state
    }

    /// Start the alert service
    pub async fn start(self) -> Result<()> {
        let app = routes::build_router(self.state.clone());

        // Value everything once before the first scheduled cycle, no digest
        let startup_state = self.state.clone();
        tokio::spawn(async move {
            let report = startup_state
                .pipeline
                .recompute_only(MarketFilter::All)
                .await;
            tracing::info!(
                succeeded = report.succeeded,
                failed = report.failed.len(),
                "Start-up recompute finished"
            );
        });

        let scheduler_state = self.state.clone();
        tokio::spawn(async move {
            scheduler_state.scheduler.run().await;
        });

        let addr: SocketAddr = self.state.config.bind_address().parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.state.scheduler.stop().await;
        tracing::info!("Stock Alert stopped");

        Ok(())
    }
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Signal handlers unavailable, falling back to Ctrl+C");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

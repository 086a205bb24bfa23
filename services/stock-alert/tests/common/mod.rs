//! Shared mocks for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use stock_alert::data::{
    DomesticQuote, FiveYearAverages, ForeignStatistics, ForwardRoe, HistoricalSeries,
    SourceAdapter,
};
use stock_alert::error::{FetchError, MailError};
use stock_alert::notification::MailSender;
use stock_alert::valuation::Valuator;
use stock_alert::AlertState;
use stock_common::config::{Config, StockRecord};
use stock_common::store::{ConfigStore, JsonConfigStore};

// ============================================================================
// Sources
// ============================================================================

/// Foreign statistics keyed by ticker. Unknown tickers fail.
pub struct ScriptedStatistics {
    pages: Mutex<HashMap<String, ForeignStatistics>>,
    calls: AtomicU32,
    /// When set, each fetch waits for a permit
    gate: Option<Semaphore>,
}

impl ScriptedStatistics {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            calls: AtomicU32::new(0),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// Script a page whose value is `27 / roe_percent`.
    pub fn with(self, ticker: &str, name: &str, roe_percent: &str) -> Self {
        self.set(ticker, name, roe_percent);
        self
    }

    pub fn set(&self, ticker: &str, name: &str, roe_percent: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(ticker.to_string(), statistics(name, roe_percent));
    }

    pub fn remove(&self, ticker: &str) {
        self.pages.lock().unwrap().remove(ticker);
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1000);
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedStatistics {
    type Output = ForeignStatistics;

    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, ticker: &str) -> Result<ForeignStatistics, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }

        self.pages
            .lock()
            .unwrap()
            .get(ticker)
            .cloned()
            .ok_or_else(|| FetchError::Transport {
                url: format!("https://finance.example/{}", ticker),
                message: "404 Not Found".into(),
            })
    }
}

/// Trailing PE 30, forward PE 20, so the blended PE is 27.
pub fn statistics(name: &str, roe_percent: &str) -> ForeignStatistics {
    ForeignStatistics {
        name: name.into(),
        price: "100.00".into(),
        trailing_pe: series("30"),
        forward_pe: series("20"),
        pb: series("5"),
        roe: roe_percent.into(),
        dividend: "0.5".into(),
    }
}

fn series(current: &str) -> HistoricalSeries {
    HistoricalSeries {
        current: current.into(),
        ..Default::default()
    }
}

/// Domestic sources that always return the same figures: PE 21.2, ROE 10.6.
pub struct Constant<T>(pub T);

#[async_trait]
impl<T: Clone + Send + Sync> SourceAdapter for Constant<T> {
    type Output = T;

    fn name(&self) -> &'static str {
        "constant"
    }

    async fn fetch(&self, _ticker: &str) -> Result<T, FetchError> {
        Ok(self.0.clone())
    }
}

pub fn valuator(statistics: Arc<ScriptedStatistics>) -> Arc<Valuator> {
    Arc::new(Valuator::new(
        Arc::new(Constant(DomesticQuote {
            name: "贵州茅台".into(),
            price: "1688.00".into(),
            pe: 21.2,
            pb: 8.9,
        })),
        Arc::new(Constant(FiveYearAverages {
            avg_roe: 10.0,
            dividend: "1.85%".into(),
        })),
        Arc::new(Constant(ForwardRoe(12.0))),
        statistics,
    ))
}

// ============================================================================
// Mail
// ============================================================================

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn bodies(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send_digest(
        &self,
        _recipients: &[String],
        _subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("connection refused".into()));
        }
        self.sent.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

// ============================================================================
// Store
// ============================================================================

/// Store whose saves always fail.
pub struct BrokenStore;

impl ConfigStore for BrokenStore {
    fn load(&self) -> stock_common::Result<Config> {
        Ok(Config::default())
    }

    fn save_stocks(&self, _stocks: &[StockRecord]) -> stock_common::Result<()> {
        Err(stock_common::Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}

pub fn record(ticker: &str, name: &str) -> StockRecord {
    StockRecord {
        ticker: ticker.into(),
        name: name.into(),
        alert_enabled: true,
        market: None,
        last_alert_at: None,
    }
}

/// Config with the given watch-list, one recipient and no pacing.
pub fn config(stocks: Vec<StockRecord>) -> Config {
    let mut config = Config::default();
    config.stocks = stocks;
    config.alert.mails = vec!["admin@example.com".into()];
    config.alert.alert_interval_minutes = 60;
    config.fetch.interval_ms = 0;
    config
}

pub fn persisted(dir: &Path) -> Vec<StockRecord> {
    Config::load_from(&dir.join("config.json")).unwrap().stocks
}

/// Service state over a temp-dir JSON store.
pub fn state(
    dir: &Path,
    stocks: Vec<StockRecord>,
    statistics: Arc<ScriptedStatistics>,
    mailer: Arc<RecordingMailer>,
) -> AlertState {
    let store = Arc::new(JsonConfigStore::open(dir).unwrap());
    AlertState::new(
        config(stocks),
        store,
        valuator(statistics),
        Some(mailer as Arc<dyn MailSender>),
    )
    .unwrap()
}

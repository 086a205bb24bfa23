//! Watched stock and valuation result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use stock_common::config::{AlertConfig, StockRecord};

use crate::error::ValuationError;
use crate::market::{classify, normalize_ticker, Market};

/// Wire sentinel for "unavailable".
pub const UNAVAILABLE_SENTINEL: f64 = -1.0;

/// Serialize `None` as the `-1` sentinel.
pub fn serialize_sentinel<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(value.unwrap_or(UNAVAILABLE_SENTINEL))
}

// ============================================================================
// Thresholds & bands
// ============================================================================

/// Valuation thresholds gating both banding and alert eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
}

impl From<&AlertConfig> for Thresholds {
    fn from(config: &AlertConfig) -> Self {
        Self {
            low: config.low,
            high: config.high,
        }
    }
}

/// Classification of a value against the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValuationBand {
    /// Undervalued (低估)
    Low,
    Middle,
    /// Overvalued (高估)
    High,
    /// No value could be derived
    #[default]
    Unavailable,
}

impl ValuationBand {
    /// Band a value. `None` and the sentinel itself are unavailable.
    pub fn classify(value: Option<f64>, thresholds: &Thresholds) -> Self {
        match value {
            None => Self::Unavailable,
            Some(v) if v == UNAVAILABLE_SENTINEL => Self::Unavailable,
            Some(v) if v < thresholds.low => Self::Low,
            Some(v) if v > thresholds.high => Self::High,
            Some(_) => Self::Middle,
        }
    }

    /// Whether this band warrants an alert.
    pub fn is_alerting(&self) -> bool {
        matches!(self, Self::Low | Self::High)
    }

    /// Digest label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "低估",
            Self::Middle => "合理",
            Self::High => "高估",
            Self::Unavailable => "N/A",
        }
    }
}

// ============================================================================
// Valuation update
// ============================================================================

/// Result of one successful valuation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationUpdate {
    pub market: Market,
    pub name: String,
    pub price: String,
    pub dividend: String,
    /// Domestic: PE (TTM). Foreign: blended trailing/forward PE.
    pub pe: f64,
    pub pb: f64,
    /// Combined ROE in percent, `None` when the source reports none
    pub roe: Option<f64>,
    /// PE / ROE, `None` when ROE is unavailable
    pub value: Option<f64>,
}

// ============================================================================
// Stock
// ============================================================================

/// One watched ticker with its last valuation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stock {
    pub ticker: String,
    /// Empty until the first successful fetch
    pub name: String,
    pub market: Market,
    pub alert_enabled: bool,
    pub last_alert_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_sentinel")]
    pub value: Option<f64>,
    #[serde(serialize_with = "serialize_sentinel")]
    pub pe: Option<f64>,
    #[serde(serialize_with = "serialize_sentinel")]
    pub pb: Option<f64>,
    #[serde(serialize_with = "serialize_sentinel")]
    pub roe: Option<f64>,
    pub value_computed_at: Option<DateTime<Utc>>,
    pub band: ValuationBand,
    pub price: String,
    pub dividend: String,
}

impl Stock {
    /// A freshly added stock, not yet valued.
    pub fn new(ticker: &str) -> Result<Self, ValuationError> {
        let ticker = normalize_ticker(ticker);
        let market = classify(&ticker)?;

        Ok(Self {
            ticker,
            name: String::new(),
            market,
            alert_enabled: true,
            last_alert_at: None,
            value: None,
            pe: None,
            pb: None,
            roe: None,
            value_computed_at: None,
            band: ValuationBand::Unavailable,
            price: String::new(),
            dividend: String::new(),
        })
    }

    /// Rebuild a stock from its persisted record.
    ///
    /// The market is recomputed from the ticker; a disagreeing persisted tag
    /// is logged and overridden.
    pub fn from_record(record: &StockRecord) -> Result<Self, ValuationError> {
        let mut stock = Self::new(&record.ticker)?;
        stock.name = record.name.clone();
        stock.alert_enabled = record.alert_enabled;
        stock.last_alert_at = record.last_alert_at;

        if let Some(tag) = record.market.as_deref() {
            if Market::from_tag(tag) != Some(stock.market) {
                tracing::warn!(
                    ticker = %stock.ticker,
                    persisted = tag,
                    derived = stock.market.tag(),
                    "Persisted market disagrees with ticker, using derived market"
                );
            }
        }

        Ok(stock)
    }

    /// Persistable record.
    pub fn to_record(&self) -> StockRecord {
        StockRecord {
            ticker: self.ticker.clone(),
            name: self.name.clone(),
            alert_enabled: self.alert_enabled,
            market: Some(self.market.tag().to_string()),
            last_alert_at: self.last_alert_at,
        }
    }

    /// Apply a successful valuation and re-band.
    pub fn apply(
        &mut self,
        update: ValuationUpdate,
        thresholds: &Thresholds,
        now: DateTime<Utc>,
    ) -> ValuationBand {
        self.name = update.name;
        self.market = update.market;
        self.price = update.price;
        self.dividend = update.dividend;
        self.pe = Some(update.pe);
        self.pb = Some(update.pb);
        self.roe = update.roe;
        self.value = update.value;
        self.value_computed_at = Some(now);
        self.band = ValuationBand::classify(self.value, thresholds);
        self.band
    }
}

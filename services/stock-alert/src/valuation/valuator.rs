//! Fair-value computation.
//!
//! # Domestic
//!
//! ```text
//! combined ROE = forward ROE                          if avg ROE == 0
//!              = avg ROE * 0.7 + forward ROE * 0.3    otherwise
//! value        = PE(TTM) / combined ROE
//! ```
//!
//! # Foreign
//!
//! ```text
//! PE    = trailing PE * 0.7 + forward PE * 0.3
//! value = PE / ROE          (unavailable when ROE is "N/A")
//! ```

use chrono::Utc;
use std::sync::Arc;

use super::averager::resolve_series;
use super::types::{Stock, Thresholds, ValuationBand, ValuationUpdate};
use crate::data::{
    is_not_applicable, parse_number, percent_display, DomesticQuote, EniuRoeAdapter,
    FiveYearAverages, ForeignStatistics, ForwardRoe, JisiluAveragesAdapter, SourceAdapter,
    TencentQuoteAdapter, Transport, YahooStatisticsAdapter,
};
use crate::error::{FetchError, ValuationError};
use crate::market::{classify, Market};

/// Weight of the historical figure in a blended ratio.
const HISTORICAL_WEIGHT: f64 = 0.7;
/// Weight of the forward-looking figure in a blended ratio.
const FORWARD_WEIGHT: f64 = 0.3;

/// Blend five-year average ROE with the forward estimate.
///
/// An average of zero means the source had no data; the forward estimate
/// is used alone.
pub fn combined_roe(avg_roe: f64, forward_roe: f64) -> f64 {
    if avg_roe == 0.0 {
        forward_roe
    } else {
        avg_roe * HISTORICAL_WEIGHT + forward_roe * FORWARD_WEIGHT
    }
}

/// Blend trailing and forward PE.
pub fn blended_pe(trailing_pe: f64, forward_pe: f64) -> f64 {
    trailing_pe * HISTORICAL_WEIGHT + forward_pe * FORWARD_WEIGHT
}

fn divide(pe: f64, roe: f64) -> Result<f64, ValuationError> {
    if roe == 0.0 {
        return Err(ValuationError::DivideByZero);
    }
    let value = pe / roe;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValuationError::DivideByZero)
    }
}

/// Orchestrates the source adapters for one ticker.
pub struct Valuator {
    quote: Arc<dyn SourceAdapter<Output = DomesticQuote>>,
    averages: Arc<dyn SourceAdapter<Output = FiveYearAverages>>,
    forward_roe: Arc<dyn SourceAdapter<Output = ForwardRoe>>,
    statistics: Arc<dyn SourceAdapter<Output = ForeignStatistics>>,
}

impl Valuator {
    /// Create a valuator from explicit adapters.
    pub fn new(
        quote: Arc<dyn SourceAdapter<Output = DomesticQuote>>,
        averages: Arc<dyn SourceAdapter<Output = FiveYearAverages>>,
        forward_roe: Arc<dyn SourceAdapter<Output = ForwardRoe>>,
        statistics: Arc<dyn SourceAdapter<Output = ForeignStatistics>>,
    ) -> Self {
        Self {
            quote,
            averages,
            forward_roe,
            statistics,
        }
    }

    /// Create a valuator backed by the scraped sources.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::new(
            Arc::new(TencentQuoteAdapter::new(Arc::clone(&transport))),
            Arc::new(JisiluAveragesAdapter::new(Arc::clone(&transport))),
            Arc::new(EniuRoeAdapter::new(Arc::clone(&transport))),
            Arc::new(YahooStatisticsAdapter::new(transport)),
        )
    }

    /// Value a ticker without touching any stock.
    pub async fn evaluate(&self, ticker: &str) -> Result<ValuationUpdate, ValuationError> {
        match classify(ticker)? {
            Market::Domestic => self.evaluate_domestic(ticker).await,
            Market::Foreign => self.evaluate_foreign(ticker).await,
        }
    }

    /// Value a stock in place and return its new band.
    ///
    /// On failure the stock is left unchanged.
    pub async fn compute_value(
        &self,
        stock: &mut Stock,
        thresholds: &Thresholds,
    ) -> Result<ValuationBand, ValuationError> {
        let update = self.evaluate(&stock.ticker).await?;
        Ok(stock.apply(update, thresholds, Utc::now()))
    }

    async fn evaluate_domestic(&self, ticker: &str) -> Result<ValuationUpdate, ValuationError> {
        let quote = self
            .quote
            .fetch(ticker)
            .await
            .map_err(ValuationError::SourceA)?;

        let averages = self
            .averages
            .fetch(ticker)
            .await
            .map_err(ValuationError::SourceB)?;

        let ForwardRoe(forward_roe) = self
            .forward_roe
            .fetch(ticker)
            .await
            .map_err(ValuationError::SourceC)?;

        let roe = combined_roe(averages.avg_roe, forward_roe);
        let value = divide(quote.pe, roe)?;

        tracing::debug!(
            ticker,
            pe = quote.pe,
            avg_roe = averages.avg_roe,
            forward_roe,
            value,
            "Domestic valuation computed"
        );

        Ok(ValuationUpdate {
            market: Market::Domestic,
            name: quote.name,
            price: quote.price,
            dividend: averages.dividend,
            pe: quote.pe,
            pb: quote.pb,
            roe: Some(roe),
            value: Some(value),
        })
    }

    async fn evaluate_foreign(&self, ticker: &str) -> Result<ValuationUpdate, ValuationError> {
        let stats = self
            .statistics
            .fetch(ticker)
            .await
            .map_err(ValuationError::Source)?;

        let required = [
            ("name", &stats.name),
            ("trailing_pe", &stats.trailing_pe.current),
            ("forward_pe", &stats.forward_pe.current),
            ("roe", &stats.roe),
            ("dividend", &stats.dividend),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ValuationError::Source(FetchError::MissingField {
                origin: self.statistics.name(),
                field: *field,
            }));
        }

        let trailing_pe =
            resolve_series("trailing_pe", &stats.trailing_pe).map_err(ValuationError::Source)?;
        let forward_pe =
            resolve_series("forward_pe", &stats.forward_pe).map_err(ValuationError::Source)?;
        let pb = resolve_series("pb", &stats.pb).map_err(ValuationError::Source)?;
        let pe = blended_pe(trailing_pe, forward_pe);

        let (roe, value) = if is_not_applicable(&stats.roe) {
            (None, None)
        } else {
            let roe = parse_number("roe", &stats.roe).map_err(ValuationError::Source)?;
            (Some(roe), Some(divide(pe, roe)?))
        };

        tracing::debug!(
            ticker,
            trailing_pe,
            forward_pe,
            roe = ?roe,
            value = ?value,
            "Foreign valuation computed"
        );

        Ok(ValuationUpdate {
            market: Market::Foreign,
            name: stats.name,
            price: stats.price,
            dividend: percent_display(&stats.dividend),
            pe,
            pb,
            roe,
            value,
        })
    }
}

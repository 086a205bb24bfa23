//! Yahoo Finance key-statistics page for foreign tickers.
//!
//! Trailing PE, forward PE and PB come with five historical columns so the
//! valuator can fall back to an average when the live figure is missing.

use async_trait::async_trait;
use std::sync::Arc;

use super::provider::{ForeignStatistics, HistoricalSeries, SourceAdapter};
use super::transport::{Extracted, FieldSpec, Recipe, Transport};
use crate::error::FetchError;

macro_rules! valuation_row {
    ($name:literal, $row:literal, $col:literal) => {
        FieldSpec::text(
            $name,
            concat!(
                "#Col1-0-KeyStatistics-Proxy thead+tbody tr:nth-child(",
                $row,
                ") td:nth-child(",
                $col,
                ")"
            ),
        )
    };
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec::text(
        "name",
        "#quote-header-info div:nth-child(2) div:nth-child(1) div:nth-child(1) h1",
    )
    .required(),
    FieldSpec::text(
        "price",
        "#quote-header-info div:nth-child(3) div:nth-child(1) div:nth-child(1) fin-streamer:nth-child(1)",
    ),
    valuation_row!("trailing_pe", "3", "2").required(),
    valuation_row!("trailing_pe_1", "3", "3"),
    valuation_row!("trailing_pe_2", "3", "4"),
    valuation_row!("trailing_pe_3", "3", "5"),
    valuation_row!("trailing_pe_4", "3", "6"),
    valuation_row!("trailing_pe_5", "3", "7"),
    valuation_row!("forward_pe", "4", "2").required(),
    valuation_row!("forward_pe_1", "4", "3"),
    valuation_row!("forward_pe_2", "4", "4"),
    valuation_row!("forward_pe_3", "4", "5"),
    valuation_row!("forward_pe_4", "4", "6"),
    valuation_row!("forward_pe_5", "4", "7"),
    valuation_row!("pb", "7", "2"),
    valuation_row!("pb_1", "7", "3"),
    valuation_row!("pb_2", "7", "4"),
    valuation_row!("pb_3", "7", "5"),
    valuation_row!("pb_4", "7", "6"),
    valuation_row!("pb_5", "7", "7"),
    FieldSpec::text(
        "roe",
        "#Col1-0-KeyStatistics-Proxy section div:nth-child(3) div:nth-child(3) div div:nth-child(3) div div table tbody tr:nth-child(2) td:nth-child(2)",
    )
    .required(),
    FieldSpec::text(
        "dividend",
        "#Col1-0-KeyStatistics-Proxy section div:nth-child(3) div:nth-child(2) div div:nth-child(3) div div table tbody tr:nth-child(5) td:nth-child(2)",
    )
    .required(),
];

pub const RECIPE: Recipe = Recipe {
    source: "yahoo",
    url_template: "https://finance.yahoo.com/quote/{ticker}/key-statistics?p={ticker}",
    scope: "#app",
    fields: FIELDS,
};

/// Foreign statistics adapter.
pub struct YahooStatisticsAdapter {
    transport: Arc<dyn Transport>,
}

impl YahooStatisticsAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn series(extracted: &Extracted, prefix: &str) -> HistoricalSeries {
        HistoricalSeries {
            current: extracted.get(prefix).to_string(),
            history: std::array::from_fn(|i| {
                extracted.get(&format!("{}_{}", prefix, i + 1)).to_string()
            }),
        }
    }

    fn parse(extracted: &Extracted) -> ForeignStatistics {
        // "Apple Inc. (AAPL)" -> "Apple Inc."
        let name = extracted
            .get("name")
            .split('(')
            .next()
            .unwrap_or("")
            .trim()
            .to_string();

        ForeignStatistics {
            name,
            price: extracted.get("price").to_string(),
            trailing_pe: Self::series(extracted, "trailing_pe"),
            forward_pe: Self::series(extracted, "forward_pe"),
            pb: Self::series(extracted, "pb"),
            roe: extracted.get("roe").to_string(),
            dividend: extracted.get("dividend").to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for YahooStatisticsAdapter {
    type Output = ForeignStatistics;

    fn name(&self) -> &'static str {
        RECIPE.source
    }

    async fn fetch(&self, ticker: &str) -> Result<ForeignStatistics, FetchError> {
        let extracted = RECIPE.fetch(self.transport.as_ref(), ticker, ticker).await?;
        Ok(Self::parse(&extracted))
    }
}

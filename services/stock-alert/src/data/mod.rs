//! Market data acquisition.
//!
//! Scraped sources, one adapter per (market, fact set) pair.
//!
//! # Data Sources
//! - **Tencent** (腾讯证券, domestic): name, price, PE (TTM), PB
//! - **Jisilu** (集思录, domestic): five-year average ROE and dividend
//! - **Eniu** (亿牛网, domestic): forward ROE estimate
//! - **Yahoo Finance** (foreign): key statistics with historical columns

mod eniu;
mod jisilu;
mod provider;
mod rate_limiter;
mod tencent;
pub mod transport;
mod yahoo;

pub use eniu::EniuRoeAdapter;
pub use jisilu::JisiluAveragesAdapter;
pub use provider::{
    is_not_applicable, parse_number, percent_display, DomesticQuote, FiveYearAverages,
    ForeignStatistics, ForwardRoe, HistoricalSeries, SourceAdapter, NOT_APPLICABLE,
};
pub use rate_limiter::{RateLimiter, SharedRateLimiter};
pub use tencent::TencentQuoteAdapter;
pub use transport::{extract_fields, Extracted, FieldSpec, HtmlTransport, Recipe, Transport};
pub use yahoo::YahooStatisticsAdapter;

/// Scrape recipes by source name.
pub fn recipes() -> [Recipe; 4] {
    [tencent::RECIPE, jisilu::RECIPE, eniu::RECIPE, yahoo::RECIPE]
}

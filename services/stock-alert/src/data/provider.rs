//! Source adapter abstraction.
//!
//! Each adapter fetches one fact set for one market from one external
//! source. Adapters never retry; a failed fetch is reported to the caller
//! and the ticker is skipped for the cycle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

// ============================================================================
// Fact sets
// ============================================================================

/// Source A: quote page facts for a domestic ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomesticQuote {
    pub name: String,
    /// Display only
    pub price: String,
    /// PE (TTM)
    pub pe: f64,
    pub pb: f64,
}

/// Source B: five-year averages for a domestic ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiveYearAverages {
    /// Average ROE in percent, 0 when the source reports no data
    pub avg_roe: f64,
    /// Display string ("2.35%" or "N/A")
    pub dividend: String,
}

/// Source C: forward ROE estimate for a domestic ticker, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForwardRoe(pub f64);

/// A live figure plus its five most recent historical columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub current: String,
    pub history: [String; 5],
}

/// Foreign key-statistics page, left as raw strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignStatistics {
    pub name: String,
    pub price: String,
    pub trailing_pe: HistoricalSeries,
    pub forward_pe: HistoricalSeries,
    pub pb: HistoricalSeries,
    /// "12.5%" or "N/A"
    pub roe: String,
    /// "1.2" / "1.2%" or "N/A"
    pub dividend: String,
}

// ============================================================================
// Adapter trait
// ============================================================================

/// Fetches one fact set for a ticker.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Output: Send;

    /// Source name for logs
    fn name(&self) -> &'static str;

    async fn fetch(&self, ticker: &str) -> Result<Self::Output, FetchError>;
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Marker the sources use for "not applicable".
pub const NOT_APPLICABLE: &str = "N/A";

/// Whether a raw value carries no figure.
pub fn is_not_applicable(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw == NOT_APPLICABLE || raw == "-" || raw == "--"
}

/// Parse a number, tolerating thousands separators and a trailing `%`.
pub fn parse_number(field: &str, raw: &str) -> Result<f64, FetchError> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FetchError::malformed(field, raw))
}

/// Render a percentage for display: `"<n>%"` or `"N/A"`.
pub fn percent_display(raw: &str) -> String {
    if is_not_applicable(raw) {
        return NOT_APPLICABLE.to_string();
    }
    format!("{}%", raw.trim().trim_end_matches('%').trim())
}

//! Market classification.
//!
//! A ticker is domestic when its first two characters are a known A-share
//! exchange prefix; everything else goes down the foreign path. The same
//! prefix table drives the exchange-qualified symbols used in source URLs,
//! so the market and the recipe chosen for a ticker cannot disagree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValuationError;

/// Trading venue classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Shanghai / Shenzhen listed A-shares
    Domestic,
    /// Everything else (US listings)
    Foreign,
}

impl Market {
    /// Short tag persisted with each record.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Domestic => "ch",
            Self::Foreign => "us",
        }
    }

    /// Parse a persisted market tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "ch" | "domestic" => Some(Self::Domestic),
            "us" | "foreign" => Some(Self::Foreign),
            _ => None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domestic => write!(f, "domestic"),
            Self::Foreign => write!(f, "foreign"),
        }
    }
}

/// Domestic exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
}

impl Exchange {
    /// Prefix used by the quote and chart sites ("sh600519").
    pub fn code(&self) -> &'static str {
        match self {
            Self::Shanghai => "sh",
            Self::Shenzhen => "sz",
        }
    }
}

/// Two-character ticker prefixes of the domestic exchanges.
const EXCHANGE_PREFIXES: &[(&str, Exchange)] = &[
    ("60", Exchange::Shanghai), // main board
    ("68", Exchange::Shanghai), // STAR market
    ("00", Exchange::Shenzhen), // main board
    ("30", Exchange::Shenzhen), // ChiNext
];

/// Trim and ASCII-uppercase a ticker as typed by an administrator.
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Exchange for a domestic ticker, `None` for anything else.
pub fn exchange_of(ticker: &str) -> Option<Exchange> {
    let prefix = ticker.get(..2)?;
    EXCHANGE_PREFIXES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, exchange)| *exchange)
}

/// Classify a ticker. Total over non-empty input.
pub fn classify(ticker: &str) -> Result<Market, ValuationError> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(ValuationError::InvalidTicker(ticker.to_string()));
    }

    Ok(match exchange_of(ticker) {
        Some(_) => Market::Domestic,
        None => Market::Foreign,
    })
}

/// Exchange-qualified symbol for a domestic ticker ("sh600519").
pub fn exchange_symbol(ticker: &str) -> Option<String> {
    exchange_of(ticker).map(|exchange| format!("{}{}", exchange.code(), ticker))
}

// ============================================================================
// Chart links
// ============================================================================

/// Metric shown on an external chart page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMetric {
    Price,
    Roe,
    Pe,
    Pb,
    Dividend,
}

impl ChartMetric {
    pub const ALL: [ChartMetric; 5] = [
        ChartMetric::Price,
        ChartMetric::Roe,
        ChartMetric::Pe,
        ChartMetric::Pb,
        ChartMetric::Dividend,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Roe => "roe",
            Self::Pe => "pe",
            Self::Pb => "pb",
            Self::Dividend => "dividend",
        }
    }
}

/// External chart page for one metric of one stock.
pub fn chart_url(ticker: &str, market: Market, metric: ChartMetric) -> Option<String> {
    match market {
        Market::Domestic => {
            let symbol = exchange_symbol(ticker)?;
            let page = match metric {
                ChartMetric::Price => "price",
                ChartMetric::Roe => "roe",
                ChartMetric::Pe => "pe_ttm",
                ChartMetric::Pb => "pb",
                ChartMetric::Dividend => "dv",
            };
            Some(format!("https://eniu.com/gu/{}/{}", symbol, page))
        }
        Market::Foreign => {
            let page = match metric {
                ChartMetric::Price => "summary/price",
                ChartMetric::Roe => "growth/roe",
                ChartMetric::Pe => "value/pe-ratio",
                ChartMetric::Pb => "value/price-to-book-value",
                ChartMetric::Dividend => "dividends/dividend-yield",
            };
            Some(format!(
                "https://www.financecharts.com/stocks/{}/{}",
                ticker, page
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("600519", Market::Domestic ; "shanghai main board")]
    #[test_case("688981", Market::Domestic ; "star market")]
    #[test_case("000858", Market::Domestic ; "shenzhen main board")]
    #[test_case("300750", Market::Domestic ; "chinext")]
    #[test_case("AAPL", Market::Foreign ; "us listing")]
    #[test_case("BRK-B", Market::Foreign ; "us class shares")]
    #[test_case("6", Market::Foreign ; "single character")]
    fn test_classify(ticker: &str, expected: Market) {
        assert_eq!(classify(ticker).unwrap(), expected);
        // deterministic
        assert_eq!(classify(ticker).unwrap(), expected);
    }

    #[test]
    fn test_classify_rejects_empty() {
        assert!(matches!(classify(""), Err(ValuationError::InvalidTicker(_))));
        assert!(matches!(classify("   "), Err(ValuationError::InvalidTicker(_))));
    }

    #[test]
    fn test_classify_handles_multibyte_input() {
        assert_eq!(classify("茅台").unwrap(), Market::Foreign);
    }

    #[test]
    fn test_market_tags_round_trip() {
        for market in [Market::Domestic, Market::Foreign] {
            assert_eq!(Market::from_tag(market.tag()), Some(market));
        }
        assert_eq!(Market::from_tag("hk"), None);
    }

    #[test]
    fn test_exchange_symbol() {
        assert_eq!(exchange_symbol("600519").as_deref(), Some("sh600519"));
        assert_eq!(exchange_symbol("000858").as_deref(), Some("sz000858"));
        assert_eq!(exchange_symbol("AAPL"), None);
    }

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker("  aapl "), "AAPL");
        assert_eq!(normalize_ticker("600519"), "600519");
    }

    #[test]
    fn test_chart_urls() {
        assert_eq!(
            chart_url("600519", Market::Domestic, ChartMetric::Pe).as_deref(),
            Some("https://eniu.com/gu/sh600519/pe_ttm")
        );
        assert_eq!(
            chart_url("AAPL", Market::Foreign, ChartMetric::Dividend).as_deref(),
            Some("https://www.financecharts.com/stocks/AAPL/dividends/dividend-yield")
        );
        assert_eq!(chart_url("AAPL", Market::Domestic, ChartMetric::Price), None);
    }
}

//! Jisilu detail page (集思录): five-year average ROE and dividend yield.
//!
//! The dividend average lives in a `title` attribute shaped like
//! `"5年平均股息率：2.35%"`; the ROE cell reads `"5年平均 12.34%"`. Either
//! figure may be `"-"` when the source has no data.

use async_trait::async_trait;
use std::sync::Arc;

use super::provider::{
    is_not_applicable, parse_number, percent_display, FiveYearAverages, SourceAdapter,
    NOT_APPLICABLE,
};
use super::transport::{Extracted, FieldSpec, Recipe, Transport};
use crate::error::FetchError;

const FIELDS: &[FieldSpec] = &[
    FieldSpec::text("dividend", "tr:nth-child(2) td:nth-child(2)")
        .attr("title")
        .required(),
    FieldSpec::text("avg_roe", "tr:nth-child(3) td:nth-child(2)").required(),
];

pub const RECIPE: Recipe = Recipe {
    source: "jisilu",
    url_template: "https://www.jisilu.cn/data/stock/{ticker}",
    scope: "#stock_detail tbody",
    fields: FIELDS,
};

/// Source B adapter.
pub struct JisiluAveragesAdapter {
    transport: Arc<dyn Transport>,
}

impl JisiluAveragesAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn parse(extracted: &Extracted) -> Result<FiveYearAverages, FetchError> {
        let raw_dividend = extracted.get("dividend");
        let dividend_figure = raw_dividend
            .rsplit(|c: char| c == '：' || c == ':')
            .next()
            .unwrap_or(raw_dividend)
            .trim();
        let dividend = if is_not_applicable(dividend_figure) {
            NOT_APPLICABLE.to_string()
        } else {
            let number: String = dividend_figure
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            parse_number("dividend", &number)?;
            percent_display(&number)
        };

        let raw_roe = extracted.get("avg_roe");
        let mut tokens = raw_roe.split_whitespace();
        let first = tokens.next().unwrap_or("");
        let roe_figure = tokens.next().unwrap_or(first);
        let avg_roe = if is_not_applicable(roe_figure) {
            0.0
        } else {
            parse_number("avg_roe", roe_figure)?
        };

        Ok(FiveYearAverages { avg_roe, dividend })
    }
}

#[async_trait]
impl SourceAdapter for JisiluAveragesAdapter {
    type Output = FiveYearAverages;

    fn name(&self) -> &'static str {
        RECIPE.source
    }

    async fn fetch(&self, ticker: &str) -> Result<FiveYearAverages, FetchError> {
        let extracted = RECIPE.fetch(self.transport.as_ref(), ticker, ticker).await?;
        Self::parse(&extracted)
    }
}

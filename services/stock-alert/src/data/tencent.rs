//! Tencent quote page (腾讯证券): name, price, PE (TTM) and PB.

use async_trait::async_trait;
use std::sync::Arc;

use super::provider::{parse_number, DomesticQuote, SourceAdapter};
use super::transport::{Extracted, FieldSpec, Recipe, Transport};
use crate::error::FetchError;
use crate::market::exchange_symbol;

const FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", "div.gb_title div.title_bg h1:nth-child(1)").required(),
    FieldSpec::text("price", "#spFP div:nth-child(1) span:nth-child(1)"),
    FieldSpec::text(
        "pe",
        "div.content div.col-2 ul:nth-child(3) li:nth-child(4) span:nth-child(2)",
    )
    .required(),
    FieldSpec::text(
        "pb",
        "div.content div.col-2 ul:nth-child(3) li:nth-child(2) span:nth-child(2)",
    )
    .required(),
];

pub const RECIPE: Recipe = Recipe {
    source: "tencent",
    url_template: "https://gu.qq.com/{symbol}/gp",
    scope: "#hqpanel",
    fields: FIELDS,
};

/// Source A adapter.
pub struct TencentQuoteAdapter {
    transport: Arc<dyn Transport>,
}

impl TencentQuoteAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn parse(extracted: &Extracted) -> Result<DomesticQuote, FetchError> {
        Ok(DomesticQuote {
            name: extracted.get("name").to_string(),
            price: extracted.get("price").to_string(),
            pe: parse_number("pe", extracted.get("pe"))?,
            pb: parse_number("pb", extracted.get("pb"))?,
        })
    }
}

#[async_trait]
impl SourceAdapter for TencentQuoteAdapter {
    type Output = DomesticQuote;

    fn name(&self) -> &'static str {
        RECIPE.source
    }

    async fn fetch(&self, ticker: &str) -> Result<DomesticQuote, FetchError> {
        let symbol =
            exchange_symbol(ticker).ok_or_else(|| FetchError::malformed("ticker", ticker))?;
        let extracted = RECIPE.fetch(self.transport.as_ref(), ticker, &symbol).await?;
        Self::parse(&extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::transport::extract_fields;

    const PAGE: &str = r#"
        <div id="hqpanel">
          <div class="gb_title"><div class="title_bg"><h1>贵州茅台</h1><h1>600519</h1></div></div>
          <div id="spFP"><div><span>1688.00</span><span>+1.2%</span></div></div>
          <div class="content"><div class="col-2">
            <ul><li>x</li></ul>
            <ul><li>x</li></ul>
            <ul>
              <li><span>总市值</span><span>2.1万亿</span></li>
              <li><span>市净率</span><span>8.95</span></li>
              <li><span>成交额</span><span>50亿</span></li>
              <li><span>市盈率(TTM)</span><span>24.10</span></li>
            </ul>
          </div></div>
        </div>
    "#;

    #[test]
    fn test_recipe_against_fixture() {
        let extracted = extract_fields(PAGE, RECIPE.scope, RECIPE.fields).unwrap();
        let quote = TencentQuoteAdapter::parse(&extracted).unwrap();

        assert_eq!(quote.name, "贵州茅台");
        assert_eq!(quote.price, "1688.00");
        assert_eq!(quote.pe, 24.10);
        assert_eq!(quote.pb, 8.95);
    }

    #[test]
    fn test_url_uses_exchange_symbol() {
        assert_eq!(RECIPE.url("600519", "sh600519"), "https://gu.qq.com/sh600519/gp");
    }

    #[test]
    fn test_unparseable_pe() {
        let extracted: Extracted = [("name", "X"), ("pe", "亏损"), ("pb", "1.0")]
            .into_iter()
            .collect();
        assert!(matches!(
            TencentQuoteAdapter::parse(&extracted),
            Err(FetchError::Malformed { .. })
        ));
    }
}

//! Eniu ROE page (亿牛网): forward ROE estimate.

use async_trait::async_trait;
use std::sync::Arc;

use super::provider::{parse_number, ForwardRoe, SourceAdapter};
use super::transport::{Extracted, FieldSpec, Recipe, Transport};
use crate::error::FetchError;
use crate::market::exchange_symbol;

const FIELDS: &[FieldSpec] = &[FieldSpec::text("forward_roe", "p:nth-child(6) a").required()];

pub const RECIPE: Recipe = Recipe {
    source: "eniu",
    url_template: "https://eniu.com/gu/{symbol}/roe",
    scope: "#changyong",
    fields: FIELDS,
};

/// Source C adapter.
pub struct EniuRoeAdapter {
    transport: Arc<dyn Transport>,
}

impl EniuRoeAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn parse(extracted: &Extracted) -> Result<ForwardRoe, FetchError> {
        parse_number("forward_roe", extracted.get("forward_roe")).map(ForwardRoe)
    }
}

#[async_trait]
impl SourceAdapter for EniuRoeAdapter {
    type Output = ForwardRoe;

    fn name(&self) -> &'static str {
        RECIPE.source
    }

    async fn fetch(&self, ticker: &str) -> Result<ForwardRoe, FetchError> {
        let symbol =
            exchange_symbol(ticker).ok_or_else(|| FetchError::malformed("ticker", ticker))?;
        let extracted = RECIPE.fetch(self.transport.as_ref(), ticker, &symbol).await?;
        Self::parse(&extracted)
    }
}

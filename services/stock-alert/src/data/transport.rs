//! Fetch-and-extract transport.
//!
//! A [`Recipe`] names a URL template, a CSS scope and the fields to pull
//! out of that scope. The [`Transport`] fetches the page and returns the
//! extracted strings; it has no knowledge of what the fields mean.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use stock_common::config::FetchConfig;

use crate::error::FetchError;

// ============================================================================
// Recipes
// ============================================================================

/// One named field inside the extraction scope.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    /// CSS selector, relative to the scope element
    pub selector: &'static str,
    /// Read this attribute instead of the element text
    pub attr: Option<&'static str>,
    /// Empty or absent value is a `MissingField` error
    pub required: bool,
}

impl FieldSpec {
    pub const fn text(name: &'static str, selector: &'static str) -> Self {
        Self {
            name,
            selector,
            attr: None,
            required: false,
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn attr(self, attr: &'static str) -> Self {
        Self {
            attr: Some(attr),
            ..self
        }
    }
}

/// Scrape recipe for one source.
#[derive(Debug, Clone, Copy)]
pub struct Recipe {
    /// Source name for logs and errors
    pub source: &'static str,
    /// URL with `{ticker}` and `{symbol}` placeholders
    pub url_template: &'static str,
    /// Selector of the extraction root
    pub scope: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Recipe {
    /// Render the target URL.
    pub fn url(&self, ticker: &str, symbol: &str) -> String {
        self.url_template
            .replace("{ticker}", ticker)
            .replace("{symbol}", symbol)
    }

    /// Fetch through `transport` and enforce required fields.
    pub async fn fetch(
        &self,
        transport: &dyn Transport,
        ticker: &str,
        symbol: &str,
    ) -> Result<Extracted, FetchError> {
        let url = self.url(ticker, symbol);
        let extracted = transport.extract(&url, self.scope, self.fields).await?;

        if let Some(missing) = self
            .fields
            .iter()
            .find(|f| f.required && extracted.get(f.name).is_empty())
        {
            return Err(FetchError::MissingField {
                origin: self.source,
                field: missing.name,
            });
        }

        Ok(extracted)
    }
}

/// Field values pulled from one page. Absent fields read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted(HashMap<String, String>);

impl Extracted {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or("")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Extracted {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Fetch a page and extract named fields from within a scope.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn extract(
        &self,
        url: &str,
        scope: &str,
        fields: &[FieldSpec],
    ) -> Result<Extracted, FetchError>;
}

/// HTTP + CSS selector transport.
pub struct HtmlTransport {
    client: reqwest::Client,
}

impl HtmlTransport {
    /// Build a transport with the configured timeout and user agent.
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HtmlTransport {
    async fn extract(
        &self,
        url: &str,
        scope: &str,
        fields: &[FieldSpec],
    ) -> Result<Extracted, FetchError> {
        let transport_err = |message: String| FetchError::Transport {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(transport_err(format!("HTTP {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_err(e.to_string()))?;

        tracing::debug!(url, bytes = body.len(), "Page fetched");
        extract_fields(&body, scope, fields)
    }
}

/// Extract fields from an HTML document.
///
/// The first element matching `scope` is the root. Each field reads the
/// trimmed text (or attribute) of its first match under the root. A scope
/// that matches nothing yields all-empty fields.
pub fn extract_fields(
    html: &str,
    scope: &str,
    fields: &[FieldSpec],
) -> Result<Extracted, FetchError> {
    let scope_selector = parse_selector("scope", scope)?;
    let selectors = fields
        .iter()
        .map(|field| parse_selector(field.name, field.selector).map(|s| (field, s)))
        .collect::<Result<Vec<_>, _>>()?;

    let document = Html::parse_document(html);
    let mut extracted = Extracted::new();
    let Some(root) = document.select(&scope_selector).next() else {
        tracing::debug!(scope, "Extraction scope not found");
        return Ok(extracted);
    };

    for (field, selector) in &selectors {
        let value = root
            .select(&selector)
            .next()
            .map(|el| match field.attr {
                Some(attr) => el.value().attr(attr).unwrap_or("").trim().to_string(),
                None => el
                    .text()
                    .collect::<Vec<_>>()
                    .join("")
                    .trim()
                    .to_string(),
            })
            .unwrap_or_default();

        extracted.insert(field.name, value);
    }

    Ok(extracted)
}

fn parse_selector(field: &str, selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector)
        .map_err(|e| FetchError::malformed(field, format!("invalid selector {:?}: {:?}", selector, e)))
}

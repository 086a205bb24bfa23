//! Alert selection and throttling.
//!
//! After a recompute the deduper walks the list and picks the stocks whose
//! band warrants a mail. A stock that was mailed less than the configured
//! interval ago is skipped, so a valuation that stays out of band produces
//! one line per interval rather than one per cycle.

use chrono::{DateTime, Duration, Utc};

use crate::batch::MarketFilter;
use crate::valuation::Stock;

/// Lines collected for one digest mail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Digest {
    /// HTML body, one `<br>`-terminated line per stock
    pub body: String,
    /// Tickers whose `last_alert_at` was stamped
    pub touched: Vec<String>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    fn push_line(&mut self, stock: &Stock) {
        let value = stock.value.unwrap_or_default();
        self.body.push_str(&format!(
            "{} {:.2} {}<br>",
            stock.name,
            value,
            stock.band.label()
        ));
        self.touched.push(stock.ticker.clone());
    }
}

/// Per-stock alert throttle.
#[derive(Debug, Clone, Copy)]
pub struct AlertDeduper {
    interval: Duration,
}

impl AlertDeduper {
    /// Intervals too large for a `Duration` saturate to the maximum.
    pub fn new(interval_minutes: u64) -> Self {
        let interval = i64::try_from(interval_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .unwrap_or(Duration::MAX);
        Self { interval }
    }

    /// Whether `stock` should appear in a digest built at `now`.
    pub fn is_due(&self, stock: &Stock, now: DateTime<Utc>) -> bool {
        if !stock.alert_enabled || !stock.band.is_alerting() {
            return false;
        }

        match stock.last_alert_at {
            None => true,
            Some(last) => now.signed_duration_since(last) > self.interval,
        }
    }

    /// Select due stocks in list order and stamp them with `now`.
    pub fn collect(
        &self,
        stocks: &mut [Stock],
        now: DateTime<Utc>,
        filter: MarketFilter,
    ) -> Digest {
        let mut digest = Digest::default();

        for stock in stocks.iter_mut() {
            if !filter.matches(stock.market) || !self.is_due(stock, now) {
                continue;
            }
            stock.last_alert_at = Some(now);
            digest.push_line(stock);
        }

        if !digest.is_empty() {
            tracing::info!(
                filter = %filter,
                count = digest.touched.len(),
                tickers = ?digest.touched,
                "Alert digest collected"
            );
        }

        digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::ValuationBand;

    fn stock(ticker: &str, value: f64, band: ValuationBand) -> Stock {
        let mut stock = Stock::new(ticker).unwrap();
        stock.name = format!("{} Corp", ticker);
        stock.value = Some(value);
        stock.band = band;
        stock
    }

    #[test]
    fn test_never_alerted_low_is_included() {
        let deduper = AlertDeduper::new(60);
        let now = Utc::now();
        let mut stocks = vec![stock("AAPL", 0.5, ValuationBand::Low)];

        let digest = deduper.collect(&mut stocks, now, MarketFilter::All);

        assert_eq!(digest.body, "AAPL Corp 0.50 低估<br>");
        assert_eq!(digest.touched, vec!["AAPL".to_string()]);
        assert_eq!(stocks[0].last_alert_at, Some(now));
    }

    #[test]
    fn test_recent_alert_is_throttled() {
        let deduper = AlertDeduper::new(60);
        let now = Utc::now();
        let earlier = now - Duration::minutes(5);
        let mut stocks = vec![stock("AAPL", 2.5, ValuationBand::High)];
        stocks[0].last_alert_at = Some(earlier);

        let digest = deduper.collect(&mut stocks, now, MarketFilter::All);

        assert!(digest.is_empty());
        assert_eq!(stocks[0].last_alert_at, Some(earlier));
    }

    #[test]
    fn test_alert_after_interval_is_included() {
        let deduper = AlertDeduper::new(60);
        let now = Utc::now();
        let mut stocks = vec![stock("AAPL", 2.5, ValuationBand::High)];
        stocks[0].last_alert_at = Some(now - Duration::minutes(61));

        let digest = deduper.collect(&mut stocks, now, MarketFilter::All);

        assert_eq!(digest.body, "AAPL Corp 2.50 高估<br>");
        assert_eq!(stocks[0].last_alert_at, Some(now));
    }

    #[test]
    fn test_exact_interval_is_still_throttled() {
        let deduper = AlertDeduper::new(60);
        let now = Utc::now();
        let mut s = stock("AAPL", 0.5, ValuationBand::Low);
        s.last_alert_at = Some(now - Duration::minutes(60));
        assert!(!deduper.is_due(&s, now));
    }

    #[test]
    fn test_oversized_interval_saturates() {
        let now = Utc::now();
        let mut s = stock("AAPL", 0.5, ValuationBand::Low);
        s.last_alert_at = Some(now - Duration::days(3650));

        for minutes in [200_000_000_000_000, u64::MAX] {
            let deduper = AlertDeduper::new(minutes);
            assert!(!deduper.is_due(&s, now));
        }
    }

    #[test]
    fn test_disabled_middle_and_unavailable_are_skipped() {
        let deduper = AlertDeduper::new(60);
        let now = Utc::now();
        let mut disabled = stock("AAPL", 0.5, ValuationBand::Low);
        disabled.alert_enabled = false;
        let mut unavailable = stock("TSLA", 0.0, ValuationBand::Unavailable);
        unavailable.value = None;
        let mut stocks = vec![
            disabled,
            stock("MSFT", 1.5, ValuationBand::Middle),
            unavailable,
        ];

        let digest = deduper.collect(&mut stocks, now, MarketFilter::All);

        assert!(digest.is_empty());
        assert!(stocks.iter().all(|s| s.last_alert_at.is_none()));
    }

    #[test]
    fn test_filter_limits_to_market() {
        let deduper = AlertDeduper::new(60);
        let now = Utc::now();
        let mut stocks = vec![
            stock("AAPL", 0.5, ValuationBand::Low),
            stock("600519", 2.5, ValuationBand::High),
        ];

        let digest = deduper.collect(&mut stocks, now, MarketFilter::Domestic);

        assert_eq!(digest.touched, vec!["600519".to_string()]);
        assert!(stocks[0].last_alert_at.is_none());
    }
}

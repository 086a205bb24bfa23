//! Fallback averaging for figures with a historical series.
//!
//! The foreign statistics page sometimes omits the live figure while still
//! publishing the recent quarterly columns. When the live figure is "N/A"
//! (or blank) the mean of the non-missing historical columns stands in
//! for it.

use crate::data::{is_not_applicable, parse_number, HistoricalSeries};
use crate::error::FetchError;

/// Resolve a live figure, falling back to the historical mean.
///
/// Missing historical entries are excluded from the mean, not counted as
/// zero. No entries at all resolves to `0`.
pub fn resolve(field: &str, current: &str, historical: &[String]) -> Result<f64, FetchError> {
    if !is_not_applicable(current) {
        return parse_number(field, current);
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for entry in historical.iter().filter(|e| !is_not_applicable(e)) {
        sum += parse_number(field, entry)?;
        count += 1;
    }

    if count == 0 {
        Ok(0.0)
    } else {
        Ok(sum / count as f64)
    }
}

/// Resolve a [`HistoricalSeries`].
pub fn resolve_series(field: &str, series: &HistoricalSeries) -> Result<f64, FetchError> {
    resolve(field, &series.current, &series.history)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(values: [&str; 5]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_current_wins() {
        let h = history(["100", "200", "300", "400", "500"]);
        assert_eq!(resolve("pe", "12.5", &h).unwrap(), 12.5);
        assert_eq!(resolve("pe", "1,012.5", &h).unwrap(), 1012.5);
    }

    #[test]
    fn test_mean_of_present_entries() {
        let h = history(["10", "N/A", "20", "", "30"]);
        assert_eq!(resolve("pe", "N/A", &h).unwrap(), 20.0);
    }

    #[test]
    fn test_all_entries_missing() {
        let h = history(["N/A", "", "N/A", "", "N/A"]);
        assert_eq!(resolve("pe", "N/A", &h).unwrap(), 0.0);
    }

    #[test]
    fn test_single_entry() {
        let h = history(["", "", "", "", "42"]);
        assert_eq!(resolve("pb", "N/A", &h).unwrap(), 42.0);
    }

    #[test]
    fn test_malformed_entries() {
        let h = history(["abc", "", "", "", ""]);
        assert!(resolve("pe", "N/A", &h).is_err());
        assert!(resolve("pe", "", &h).is_err());
    }

    #[test]
    fn test_resolve_series() {
        let series = HistoricalSeries {
            current: "N/A".into(),
            history: ["1".into(), "2".into(), "3".into(), "4".into(), "5".into()],
        };
        assert_eq!(resolve_series("pe", &series).unwrap(), 3.0);
    }
}

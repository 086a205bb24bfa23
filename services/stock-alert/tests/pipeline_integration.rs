//! Integration tests for the recompute and alert cycle.
//!
//! Sources and mail are mocked; persistence goes through a real JSON store
//! in a temp directory.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use stock_alert::batch::MarketFilter;
use stock_alert::market::Market;
use stock_alert::valuation::ValuationBand;

use common::{persisted, record, state, RecordingMailer, ScriptedStatistics};

#[tokio::test]
async fn test_cycle_mails_out_of_band_stocks() {
    let dir = tempfile::tempdir().unwrap();
    let statistics = Arc::new(
        ScriptedStatistics::new()
            .with("AAPL", "Apple Inc.", "50%")
            .with("MSFT", "Microsoft Corporation", "20%")
            .with("NVDA", "NVIDIA Corporation", "10%"),
    );
    let mailer = Arc::new(RecordingMailer::default());
    let state = state(
        dir.path(),
        vec![
            record("AAPL", ""),
            record("MSFT", ""),
            record("NVDA", ""),
            record("TSLA", ""),
        ],
        statistics,
        mailer.clone(),
    );

    let report = state.pipeline.run_cycle(MarketFilter::Foreign).await;

    assert_eq!(report.batch.attempted, 4);
    assert_eq!(report.batch.succeeded, 3);
    assert_eq!(report.batch.failed.len(), 1);
    assert_eq!(report.batch.failed[0].ticker, "TSLA");
    assert_eq!(report.alerted, vec!["AAPL".to_string(), "NVDA".to_string()]);
    assert!(report.mail_sent);

    let bodies = mailer.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0],
        "Apple Inc. 0.54 低估<br>NVIDIA Corporation 2.70 高估<br>"
    );

    let watchlist = state.watchlist.snapshot().await;
    assert_eq!(watchlist.get("MSFT").unwrap().band, ValuationBand::Middle);
    assert_eq!(watchlist.get("TSLA").unwrap().band, ValuationBand::Unavailable);
    assert!(watchlist.last_recompute(Market::Foreign).is_some());
    assert!(watchlist.last_recompute(Market::Domestic).is_none());
}

#[tokio::test]
async fn test_second_cycle_is_throttled_and_state_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let statistics = Arc::new(ScriptedStatistics::new().with("AAPL", "Apple Inc.", "50%"));
    let mailer = Arc::new(RecordingMailer::default());
    let state = state(
        dir.path(),
        vec![record("AAPL", "")],
        statistics,
        mailer.clone(),
    );

    let first = state.pipeline.run_cycle(MarketFilter::All).await;
    assert_eq!(first.alerted.len(), 1);

    let saved = persisted(dir.path());
    assert_eq!(saved.len(), 1);
    assert!(saved[0].last_alert_at.is_some());
    assert_eq!(saved[0].name, "Apple Inc.");

    let second = state.pipeline.run_cycle(MarketFilter::All).await;
    assert!(second.alerted.is_empty());
    assert!(!second.mail_sent);
    assert_eq!(mailer.bodies().len(), 1);
}

#[tokio::test]
async fn test_persisted_alert_time_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut recent = record("AAPL", "Apple Inc.");
    recent.last_alert_at = Some(Utc::now() - Duration::minutes(5));
    let mut stale = record("NVDA", "NVIDIA Corporation");
    stale.last_alert_at = Some(Utc::now() - Duration::minutes(61));

    let statistics = Arc::new(
        ScriptedStatistics::new()
            .with("AAPL", "Apple Inc.", "50%")
            .with("NVDA", "NVIDIA Corporation", "50%"),
    );
    let mailer = Arc::new(RecordingMailer::default());
    let state = state(dir.path(), vec![recent, stale], statistics, mailer.clone());

    let report = state.pipeline.run_cycle(MarketFilter::Foreign).await;

    assert_eq!(report.alerted, vec!["NVDA".to_string()]);
}

#[tokio::test]
async fn test_failed_send_still_stamps_alert_time() {
    let dir = tempfile::tempdir().unwrap();
    let statistics = Arc::new(ScriptedStatistics::new().with("AAPL", "Apple Inc.", "50%"));
    let mailer = Arc::new(RecordingMailer {
        fail: true,
        ..Default::default()
    });
    let state = state(
        dir.path(),
        vec![record("AAPL", "")],
        statistics,
        mailer.clone(),
    );

    let report = state.pipeline.run_cycle(MarketFilter::Foreign).await;

    assert!(!report.mail_sent);
    assert_eq!(report.alerted, vec!["AAPL".to_string()]);
    let watchlist = state.watchlist.snapshot().await;
    assert!(watchlist.get("AAPL").unwrap().last_alert_at.is_some());
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_values() {
    let dir = tempfile::tempdir().unwrap();
    let statistics = Arc::new(ScriptedStatistics::new().with("MSFT", "Microsoft Corporation", "20%"));
    let mailer = Arc::new(RecordingMailer::default());
    let state = state(
        dir.path(),
        vec![record("MSFT", "")],
        statistics.clone(),
        mailer,
    );

    state.pipeline.recompute_only(MarketFilter::All).await;
    let before = state.watchlist.snapshot().await.get("MSFT").cloned().unwrap();
    assert!((before.value.unwrap() - 1.35).abs() < 1e-9);

    statistics.remove("MSFT");
    let report = state.pipeline.recompute_only(MarketFilter::All).await;
    assert_eq!(report.failed.len(), 1);

    let after = state.watchlist.snapshot().await.get("MSFT").cloned().unwrap();
    assert_eq!(after.value, before.value);
    assert_eq!(after.value_computed_at, before.value_computed_at);
}

#[tokio::test]
async fn test_recompute_only_never_mails() {
    let dir = tempfile::tempdir().unwrap();
    let statistics = Arc::new(ScriptedStatistics::new().with("AAPL", "Apple Inc.", "50%"));
    let mailer = Arc::new(RecordingMailer::default());
    let state = state(
        dir.path(),
        vec![record("AAPL", ""), record("600519", "")],
        statistics,
        mailer.clone(),
    );

    let report = state.pipeline.recompute_only(MarketFilter::All).await;

    assert_eq!(report.succeeded, 2);
    assert!(mailer.bodies().is_empty());
    let watchlist = state.watchlist.snapshot().await;
    assert_eq!(watchlist.get("AAPL").unwrap().band, ValuationBand::Low);
    assert!(watchlist.get("AAPL").unwrap().last_alert_at.is_none());
    assert!(watchlist.last_recompute(Market::Domestic).is_some());
}

#[tokio::test]
async fn test_domestic_cycle_leaves_foreign_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let statistics = Arc::new(ScriptedStatistics::new().with("AAPL", "Apple Inc.", "50%"));
    let mailer = Arc::new(RecordingMailer::default());
    let state = state(
        dir.path(),
        vec![record("AAPL", ""), record("600519", "")],
        statistics.clone(),
        mailer,
    );

    let report = state.pipeline.run_cycle(MarketFilter::Domestic).await;

    assert_eq!(report.batch.attempted, 1);
    assert_eq!(statistics.calls(), 0);
    let watchlist = state.watchlist.snapshot().await;
    assert_eq!(watchlist.get("600519").unwrap().name, "贵州茅台");
    assert!(watchlist.get("AAPL").unwrap().value.is_none());
}

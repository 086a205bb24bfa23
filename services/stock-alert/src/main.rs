//! Stock Alert - valuation watch-list with mailed digests.

use anyhow::Result;
use std::sync::Arc;
use stock_common::config::{config_dir, Config};
use stock_common::config_loader::check_config_files;
use stock_common::logging::init_logging_with_exclusions;
use stock_common::store::JsonConfigStore;
use stock_alert::{AlertService, AlertState};

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load and validate configuration
    let config = Config::load_and_validate()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Stock Alert v{}", env!("CARGO_PKG_VERSION"));

    let dir = config_dir();
    for (file, exists) in check_config_files(&dir) {
        tracing::debug!(file = %file, exists, "Config file");
    }

    let store = Arc::new(JsonConfigStore::open(dir)?);
    tracing::info!(
        dir = %store.dir().display(),
        stocks = config.stocks.len(),
        "Configuration loaded"
    );

    let service = AlertService::new(AlertState::from_config(config, store)?);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}

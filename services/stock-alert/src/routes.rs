//! HTTP routes for the alert service.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::batch::{BatchReport, MarketFilter};
use crate::market::{chart_url, ChartMetric, Market};
use crate::mutator::{MutationMode, ResultMessage};
use crate::scheduler::SchedulerState;
use crate::valuation::{serialize_sentinel, Stock, ValuationBand};
use crate::AlertState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct ChartLink {
    pub metric: &'static str,
    pub url: String,
}

/// One row of the watch-list as shown to the administrator.
#[derive(Debug, Serialize)]
pub struct StockView {
    /// 1-based display position
    pub index: usize,
    pub ticker: String,
    pub name: String,
    pub market: Market,
    pub alert_enabled: bool,
    pub price: String,
    pub dividend: String,
    #[serde(serialize_with = "serialize_sentinel")]
    pub value: Option<f64>,
    #[serde(serialize_with = "serialize_sentinel")]
    pub pe: Option<f64>,
    #[serde(serialize_with = "serialize_sentinel")]
    pub pb: Option<f64>,
    #[serde(serialize_with = "serialize_sentinel")]
    pub roe: Option<f64>,
    pub band: ValuationBand,
    pub band_label: &'static str,
    pub value_computed_at: Option<DateTime<Utc>>,
    pub last_alert_at: Option<DateTime<Utc>>,
    pub charts: Vec<ChartLink>,
}

impl StockView {
    fn new(index: usize, stock: &Stock) -> Self {
        let charts = ChartMetric::ALL
            .iter()
            .filter_map(|metric| {
                chart_url(&stock.ticker, stock.market, *metric).map(|url| ChartLink {
                    metric: metric.name(),
                    url,
                })
            })
            .collect();

        Self {
            index,
            ticker: stock.ticker.clone(),
            name: stock.name.clone(),
            market: stock.market,
            alert_enabled: stock.alert_enabled,
            price: stock.price.clone(),
            dividend: stock.dividend.clone(),
            value: stock.value,
            pe: stock.pe,
            pb: stock.pb,
            roe: stock.roe,
            band: stock.band,
            band_label: stock.band.label(),
            value_computed_at: stock.value_computed_at,
            last_alert_at: stock.last_alert_at,
            charts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StocksResponse {
    pub stocks: Vec<StockView>,
    pub count: usize,
}

/// A scheduled task paired with a fire time.
#[derive(Debug, Serialize)]
pub struct TaskRun {
    pub task: &'static str,
    pub at: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub stock_count: usize,
    pub alert_enabled_count: usize,
    pub last_recompute_domestic: Option<String>,
    pub last_recompute_foreign: Option<String>,
    pub scheduler: SchedulerState,
    pub next_runs: Vec<TaskRun>,
    pub last_runs: Vec<TaskRun>,
    pub mail_enabled: bool,
    pub uptime_secs: i64,
}

#[derive(Debug, Serialize)]
pub struct SchedulerResponse {
    pub scheduler: SchedulerState,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MutateRequest {
    pub ticker: String,
    pub mode: MutationMode,
}

/// Either explicit positions or an `"i>j"` command.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MoveRequest {
    Positions { from: usize, to: usize },
    Command { command: String },
}

#[derive(Debug, Default, Deserialize)]
pub struct RecomputeRequest {
    #[serde(default)]
    pub market: MarketFilter,
}

// ============================================================================
// Router
// ============================================================================

/// Build the admin router over shared state.
pub fn build_router(state: Arc<AlertState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/stocks", get(list_stocks).post(mutate_stock))
        .route("/api/v1/stocks/move", post(move_stock))
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/recompute", post(recompute))
        .route("/api/v1/scheduler/pause", post(pause_scheduler))
        .route("/api/v1/scheduler/resume", post(resume_scheduler))
        .with_state(state)
        .layer(cors)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "stock-alert".to_string(),
    })
}

/// Current watch-list in display order
pub async fn list_stocks(State(state): State<Arc<AlertState>>) -> Json<StocksResponse> {
    let watchlist = state.watchlist.snapshot().await;
    let stocks: Vec<StockView> = watchlist
        .stocks()
        .iter()
        .enumerate()
        .map(|(i, stock)| StockView::new(i + 1, stock))
        .collect();
    let count = stocks.len();

    Json(StocksResponse { stocks, count })
}

/// Service status
pub async fn get_status(State(state): State<Arc<AlertState>>) -> Json<StatusResponse> {
    let watchlist = state.watchlist.snapshot().await;
    let rfc3339 = |t: Option<DateTime<Utc>>| t.map(|t| t.to_rfc3339());

    let next_runs = state
        .scheduler
        .get_next_schedules()
        .into_iter()
        .map(|(task, at)| TaskRun {
            task: task.name(),
            at: at.to_rfc3339(),
        })
        .collect();

    let mut last_runs: Vec<TaskRun> = state
        .scheduler
        .last_executions()
        .await
        .into_iter()
        .map(|(task, at)| TaskRun {
            task: task.name(),
            at: at.to_rfc3339(),
        })
        .collect();
    last_runs.sort_by_key(|run| run.task);

    Json(StatusResponse {
        stock_count: watchlist.len(),
        alert_enabled_count: watchlist.stocks().iter().filter(|s| s.alert_enabled).count(),
        last_recompute_domestic: rfc3339(watchlist.last_recompute(Market::Domestic)),
        last_recompute_foreign: rfc3339(watchlist.last_recompute(Market::Foreign)),
        scheduler: state.scheduler.get_state().await,
        next_runs,
        last_runs,
        mail_enabled: state.pipeline.notifier().is_enabled(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// Add, toggle or delete a ticker
pub async fn mutate_stock(
    State(state): State<Arc<AlertState>>,
    Json(request): Json<MutateRequest>,
) -> Result<Json<ResultMessage>, (StatusCode, Json<ResultMessage>)> {
    let result = state.mutator.apply(&request.ticker, request.mode).await;
    respond(result)
}

/// Reorder the watch-list
pub async fn move_stock(
    State(state): State<Arc<AlertState>>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<ResultMessage>, (StatusCode, Json<ResultMessage>)> {
    let result = match request {
        MoveRequest::Positions { from, to } => state.mutator.reposition(from, to).await,
        MoveRequest::Command { command } => state.mutator.move_command(&command).await,
    };
    respond(result)
}

/// Recompute without mailing
pub async fn recompute(
    State(state): State<Arc<AlertState>>,
    request: Option<Json<RecomputeRequest>>,
) -> Json<BatchReport> {
    let filter = request.map(|Json(r)| r.market).unwrap_or_default();
    tracing::info!(filter = %filter, "Manual recompute requested");
    Json(state.pipeline.recompute_only(filter).await)
}

/// Stop firing scheduled cycles until resumed
pub async fn pause_scheduler(State(state): State<Arc<AlertState>>) -> Json<SchedulerResponse> {
    state.scheduler.pause().await;
    Json(SchedulerResponse {
        scheduler: state.scheduler.get_state().await,
    })
}

/// Resume scheduled cycles; fire times missed while paused are skipped
pub async fn resume_scheduler(State(state): State<Arc<AlertState>>) -> Json<SchedulerResponse> {
    state.scheduler.resume().await;
    Json(SchedulerResponse {
        scheduler: state.scheduler.get_state().await,
    })
}

fn respond(
    result: ResultMessage,
) -> Result<Json<ResultMessage>, (StatusCode, Json<ResultMessage>)> {
    if result.success {
        Ok(Json(result))
    } else {
        let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::BAD_REQUEST);
        Err((status, Json(result)))
    }
}

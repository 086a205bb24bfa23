//! Cron-driven alert cycles.
//!
//! Three schedules trigger a recompute-and-mail cycle: one for the domestic
//! market and two for the foreign market (around its open and close).
//! Expressions are evaluated in local time.
//!
//! # Schedule Configuration
//!
//! ```json
//! {
//!   "alert": {
//!     "cron_domestic": "0 15 * * MON-FRI",
//!     "cron_foreign_primary": "0 22 * * MON-FRI",
//!     "cron_foreign_secondary": "0 5 * * TUE-SAT"
//!   }
//! }
//! ```
//!
//! Five-field expressions get a leading seconds field.
//!
//! Cycles run inline in the polling loop. Each poll covers the fire times
//! since the previous poll, so a schedule that comes due while a long
//! cycle holds the loop still runs once the cycle returns.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use stock_common::config::{parse_cron, AlertConfig};
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

use crate::batch::MarketFilter;
use crate::pipeline::AlertPipeline;

/// How far back the first poll after start or resume looks.
const LOOKBACK_SECS: i64 = 60;

/// Scheduled task type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduledTask {
    /// Domestic recompute and digest
    DomesticCycle,
    /// Foreign recompute and digest, first slot
    ForeignCyclePrimary,
    /// Foreign recompute and digest, second slot
    ForeignCycleSecondary,
}

impl ScheduledTask {
    /// Get task name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::DomesticCycle => "domestic_cycle",
            Self::ForeignCyclePrimary => "foreign_cycle_primary",
            Self::ForeignCycleSecondary => "foreign_cycle_secondary",
        }
    }

    /// Stocks covered by the task's cycle.
    pub fn filter(&self) -> MarketFilter {
        match self {
            Self::DomesticCycle => MarketFilter::Domestic,
            Self::ForeignCyclePrimary | Self::ForeignCycleSecondary => MarketFilter::Foreign,
        }
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Stopped,
    Running,
    Paused,
}

/// A parsed schedule with its task type
struct ParsedSchedule {
    task: ScheduledTask,
    schedule: Schedule,
}

/// The span of time each poll is responsible for.
#[derive(Debug, Default)]
pub struct PollWindow {
    last_poll: Option<DateTime<Utc>>,
}

impl PollWindow {
    /// Start of the window ending at `now`, recording `now` as the next start.
    ///
    /// The first window reaches back `LOOKBACK_SECS`.
    pub fn advance(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = self
            .last_poll
            .filter(|last| *last < now)
            .unwrap_or_else(|| now - ChronoDuration::seconds(LOOKBACK_SECS));
        self.last_poll = Some(now);
        start
    }
}

/// Alert cycle scheduler
pub struct AlertScheduler {
    pipeline: Arc<AlertPipeline>,
    state: RwLock<SchedulerState>,
    schedules: Vec<ParsedSchedule>,
    window: RwLock<PollWindow>,
    /// Last execution times for each task
    last_executions: RwLock<HashMap<ScheduledTask, DateTime<Utc>>>,
}

impl AlertScheduler {
    /// Create a scheduler from the alert section.
    pub fn new(config: &AlertConfig, pipeline: Arc<AlertPipeline>) -> Result<Self> {
        let entries = [
            (ScheduledTask::DomesticCycle, &config.cron_domestic),
            (ScheduledTask::ForeignCyclePrimary, &config.cron_foreign_primary),
            (ScheduledTask::ForeignCycleSecondary, &config.cron_foreign_secondary),
        ];

        let mut schedules = Vec::with_capacity(entries.len());
        for (task, expression) in entries {
            let schedule = parse_cron(expression)
                .with_context(|| format!("Invalid {} cron: {}", task.name(), expression))?;
            schedules.push(ParsedSchedule { task, schedule });
        }

        info!(
            domestic = %config.cron_domestic,
            foreign_primary = %config.cron_foreign_primary,
            foreign_secondary = %config.cron_foreign_secondary,
            "Scheduler configured"
        );

        Ok(Self {
            pipeline,
            state: RwLock::new(SchedulerState::Stopped),
            schedules,
            window: RwLock::new(PollWindow::default()),
            last_executions: RwLock::new(HashMap::new()),
        })
    }

    pub async fn get_state(&self) -> SchedulerState {
        *self.state.read().await
    }

    pub async fn stop(&self) {
        *self.state.write().await = SchedulerState::Stopped;
        info!("Scheduler stopped");
    }

    /// Fire times that pass while paused are dropped.
    pub async fn pause(&self) {
        let mut state = self.state.write().await;
        if *state == SchedulerState::Running {
            *state = SchedulerState::Paused;
            info!("Scheduler paused");
        }
    }

    pub async fn resume(&self) {
        let mut state = self.state.write().await;
        if *state == SchedulerState::Paused {
            // Start the next window now
            self.window.write().await.advance(Utc::now());
            *state = SchedulerState::Running;
            info!("Scheduler resumed");
        }
    }

    /// When each task last ran.
    pub async fn last_executions(&self) -> HashMap<ScheduledTask, DateTime<Utc>> {
        self.last_executions.read().await.clone()
    }

    /// Run the scheduler loop until stopped.
    pub async fn run(&self) {
        *self.state.write().await = SchedulerState::Running;
        info!("Scheduler started");

        // Check every 10 seconds
        let mut check_interval = interval(Duration::from_secs(10));

        loop {
            check_interval.tick().await;

            let state = *self.state.read().await;
            match state {
                SchedulerState::Stopped => break,
                SchedulerState::Paused => continue,
                SchedulerState::Running => self.check_and_execute().await,
            }
        }
    }

    /// Check schedules and execute due tasks
    async fn check_and_execute(&self) {
        let now = Utc::now();
        let since = self.window.write().await.advance(now);

        let due: Vec<ScheduledTask> = self
            .schedules
            .iter()
            .filter(|parsed| is_due(&parsed.schedule, since, now))
            .map(|parsed| parsed.task)
            .collect();

        for task in due {
            self.execute_task(task, now).await;
        }
    }

    async fn execute_task(&self, task: ScheduledTask, now: DateTime<Utc>) {
        info!(task = task.name(), "Executing scheduled task");

        self.last_executions.write().await.insert(task, now);

        let report = self.pipeline.run_cycle(task.filter()).await;
        debug!(
            task = task.name(),
            succeeded = report.batch.succeeded,
            failed = report.batch.failed.len(),
            alerted = report.alerted.len(),
            mail_sent = report.mail_sent,
            "Scheduled task finished"
        );
    }

    /// Next fire time of each task, soonest first.
    pub fn get_next_schedules(&self) -> Vec<(ScheduledTask, DateTime<Local>)> {
        let mut next_times: Vec<_> = self
            .schedules
            .iter()
            .filter_map(|parsed| {
                parsed
                    .schedule
                    .upcoming(Local)
                    .next()
                    .map(|next| (parsed.task, next))
            })
            .collect();

        next_times.sort_by_key(|(_, time)| *time);
        next_times
    }
}

/// Whether a fire time falls in `(since, now]`.
pub fn is_due(schedule: &Schedule, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    schedule
        .after(&since.with_timezone(&Local))
        .next()
        .map_or(false, |scheduled| scheduled.with_timezone(&Utc) <= now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, h, m, s).unwrap()
    }

    #[test]
    fn test_scheduled_task_name() {
        assert_eq!(ScheduledTask::DomesticCycle.name(), "domestic_cycle");
        assert_eq!(
            ScheduledTask::ForeignCycleSecondary.filter(),
            MarketFilter::Foreign
        );
    }

    #[test]
    fn test_due_within_window() {
        let every_minute = parse_cron("* * * * *").unwrap();
        assert!(is_due(&every_minute, at(11, 59, 30), at(12, 0, 30)));
    }

    #[test]
    fn test_not_due_twice_for_same_fire_time() {
        let every_minute = parse_cron("* * * * *").unwrap();
        assert!(!is_due(&every_minute, at(12, 0, 5), at(12, 0, 30)));
        assert!(is_due(&every_minute, at(12, 0, 30), at(12, 1, 10)));
    }

    #[test]
    fn test_stale_fire_time_is_skipped() {
        let yearly = parse_cron("0 0 1 1 *").unwrap();
        let mut window = PollWindow::default();
        let now = at(12, 0, 30);
        assert!(!is_due(&yearly, window.advance(now), now));
    }

    #[test]
    fn test_first_window_looks_back() {
        let mut window = PollWindow::default();
        assert_eq!(window.advance(at(12, 0, 30)), at(11, 59, 30));
        assert_eq!(window.advance(at(12, 0, 40)), at(12, 0, 30));

        // A clock that went backwards starts a fresh look-back
        assert_eq!(window.advance(at(12, 0, 20)), at(11, 59, 20));
    }

    #[test]
    fn test_fire_during_long_cycle_runs_afterwards() {
        let every_five = parse_cron("*/5 * * * *").unwrap();
        let mut window = PollWindow::default();

        // The 12:00 fire starts a cycle that only returns at 12:07:00
        window.advance(at(11, 59, 50));
        let since = window.advance(at(12, 0, 10));
        assert!(is_due(&every_five, since, at(12, 0, 10)));

        // The 12:05 fire time passed during the cycle
        let since = window.advance(at(12, 7, 0));
        assert_eq!(since, at(12, 0, 10));
        assert!(is_due(&every_five, since, at(12, 7, 0)));

        // and is not picked up again
        let since = window.advance(at(12, 7, 10));
        assert!(!is_due(&every_five, since, at(12, 7, 10)));
    }

    #[test]
    fn test_scheduler_state() {
        assert_ne!(SchedulerState::Running, SchedulerState::Stopped);
        assert_ne!(SchedulerState::Paused, SchedulerState::Running);
    }
}

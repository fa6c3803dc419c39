//! Calendar-aligned recurring scrape runs.
//!
//! A [`Scheduler`] is an explicit handle owned by the composition root. At
//! most one schedule is active per handle; starting an active scheduler is a
//! logged no-op. On start the scheduler scrapes once right away (unless
//! disabled), then fires on interval boundaries counted from the Unix epoch,
//! so a 10 minute interval ticks at :00, :10, :20 and so on.
//!
//! Ticks do not wait for the previous run. A tick that finds a run still in
//! progress is skipped.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::RunReport;
use crate::orchestrator::Orchestrator;

/// Default interval between scheduled runs: 10 minutes
pub const DEFAULT_INTERVAL_SECS: u64 = 600;

/// Parse interval string like "1h", "10m", "1d", "90s" or raw seconds
pub fn parse_interval(s: &str) -> Result<u64, String> {
    let s = s.trim().to_lowercase();

    let secs = if let Some(hours) = s.strip_suffix('h') {
        scaled(hours, 3600, "hours")?
    } else if let Some(minutes) = s.strip_suffix('m') {
        scaled(minutes, 60, "minutes")?
    } else if let Some(days) = s.strip_suffix('d') {
        scaled(days, 86400, "days")?
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map_err(|_| format!("Invalid seconds: {}", secs))?
    } else {
        s.parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '10m', '1h', '1d'", s))?
    };

    if secs == 0 {
        return Err("Interval must be greater than zero".to_string());
    }
    Ok(secs)
}

fn scaled(count: &str, unit_secs: u64, unit: &str) -> Result<u64, String> {
    let count = count
        .parse::<u64>()
        .map_err(|_| format!("Invalid {}: {}", unit, count))?;
    count
        .checked_mul(unit_secs)
        .ok_or_else(|| format!("Interval too large: {} {}", count, unit))
}

/// Format interval for display
pub fn format_interval(secs: u64) -> String {
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Cron-style rendering of an interval.
///
/// A step is only written when it divides its parent unit, since cron steps
/// restart at every minute, hour or day boundary. Seconds steps use the
/// six-field form. Any other interval renders as `@every <interval>`.
pub fn cron_expression(secs: u64) -> String {
    let divides = |unit: u64, step: u64| unit.is_multiple_of(step);

    match secs {
        60 => "* * * * *".to_string(),
        3600 => "0 * * * *".to_string(),
        86400 => "0 0 * * *".to_string(),
        s if s < 60 && divides(60, s) => format!("*/{} * * * * *", s),
        s if s < 3600 && s.is_multiple_of(60) && divides(60, s / 60) => format!("*/{} * * * *", s / 60),
        s if s < 86400 && s.is_multiple_of(3600) && divides(24, s / 3600) => format!("0 */{} * * *", s / 3600),
        s => format!("@every {}", format_interval(s)),
    }
}

/// Human readable interval, e.g. "Every 10 minutes"
pub fn describe_interval(secs: u64) -> String {
    let (count, unit) = if secs.is_multiple_of(86400) {
        (secs / 86400, "day")
    } else if secs.is_multiple_of(3600) {
        (secs / 3600, "hour")
    } else if secs.is_multiple_of(60) {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };

    if count == 1 {
        format!("Every {}", unit)
    } else {
        format!("Every {} {}s", count, unit)
    }
}

/// Time from `now` until the next multiple of `interval_secs` since the epoch
pub fn next_tick_delay(now: DateTime<Utc>, interval_secs: u64) -> Duration {
    let period_ms = interval_secs.max(1).saturating_mul(1000);
    let now_ms = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let remainder = now_ms % period_ms;
    Duration::from_millis(period_ms - remainder)
}

/// Snapshot of the scheduler state for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub active: bool,
    pub schedule: String,
    pub interval: String,
    pub description: String,
    pub data_dir: PathBuf,
}

struct ActiveSchedule {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    interval_secs: u64,
    run_on_start: bool,
    data_dir: PathBuf,
    active: Mutex<Option<ActiveSchedule>>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        interval_secs: u64,
        run_on_start: bool,
        data_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            orchestrator,
            interval_secs: interval_secs.max(1),
            run_on_start,
            data_dir: data_dir.as_ref().to_path_buf(),
            active: Mutex::new(None),
        }
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveSchedule>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start the schedule. Returns `false` if it was already active.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|s| !s.task.is_finished()) {
            info!("Scheduler already active, ignoring start");
            return false;
        }

        let (shutdown, receiver) = watch::channel(false);
        let task = tokio::spawn(run_schedule(
            self.orchestrator.clone(),
            self.interval_secs,
            self.run_on_start,
            receiver,
        ));
        *slot = Some(ActiveSchedule { shutdown, task });

        info!(
            "Scheduler started: {} ({})",
            describe_interval(self.interval_secs),
            cron_expression(self.interval_secs)
        );
        true
    }

    /// Stop the schedule, cancelling any run it started. Returns `false` if
    /// it was not active.
    pub async fn stop(&self) -> bool {
        let active = self.slot().take();
        let Some(active) = active else {
            return false;
        };

        let _ = active.shutdown.send(true);
        if let Err(e) = active.task.await {
            if e.is_panic() {
                warn!("Scheduler task panicked: {}", e);
            }
        }
        info!("Scheduler stopped");
        true
    }

    pub fn is_active(&self) -> bool {
        self.slot().as_ref().is_some_and(|s| !s.task.is_finished())
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            active: self.is_active(),
            schedule: cron_expression(self.interval_secs),
            interval: format_interval(self.interval_secs),
            description: describe_interval(self.interval_secs),
            data_dir: self.data_dir.clone(),
        }
    }
}

async fn run_schedule(
    orchestrator: Arc<Orchestrator>,
    interval_secs: u64,
    run_on_start: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    if run_on_start {
        info!("Running initial scrape");
        tokio::select! {
            report = orchestrator.run_all() => log_report("Initial", &report),
            _ = shutdown.changed() => return,
        }
    }

    let first_tick = next_tick_delay(Utc::now(), interval_secs);
    debug!("First scheduled run in {:?}", first_tick);

    let mut ticker = interval_at(Instant::now() + first_tick, Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut runs = JoinSet::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let orchestrator = orchestrator.clone();
                runs.spawn(async move {
                    match orchestrator.try_run_all().await {
                        Some(report) => log_report("Scheduled", &report),
                        None => warn!("Previous run still in progress, skipping scheduled run"),
                    }
                });
            }
            Some(joined) = runs.join_next(), if !runs.is_empty() => {
                if let Err(e) = joined {
                    warn!("Scheduled run task failed: {}", e);
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    runs.shutdown().await;
}

fn log_report(kind: &str, report: &RunReport) {
    for (category, outcome) in report.iter() {
        match &outcome.error {
            None => info!("{} run: {} -> {} records", kind, category.label(), outcome.records),
            Some(error) => warn!("{} run: {} failed: {}", kind, category.label(), error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;
    use crate::orchestrator::RunPolicy;
    use crate::scraper::testing::{self, FixtureSessions};
    use crate::store::{FileSnapshotStore, SnapshotStore};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn scheduler(dir: &TempDir, interval_secs: u64, run_on_start: bool) -> (Scheduler, Arc<FileSnapshotStore>) {
        let store = Arc::new(FileSnapshotStore::new(dir.path()).unwrap());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(FixtureSessions::new(testing::full_page())),
            store.clone(),
            testing::SOURCE_URL,
            RunPolicy::immediate(),
        ));
        (Scheduler::new(orchestrator, interval_secs, run_on_start, dir.path()), store)
    }

    async fn wait_for_snapshot(store: &FileSnapshotStore, category: Category, within: Duration) -> bool {
        let deadline = std::time::Instant::now() + within;
        while std::time::Instant::now() < deadline {
            if store.load(category).is_some() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("10m").unwrap(), 600);
        assert_eq!(parse_interval("1h").unwrap(), 3600);
        assert_eq!(parse_interval("1d").unwrap(), 86400);
        assert_eq!(parse_interval("90s").unwrap(), 90);
        assert_eq!(parse_interval(" 600 ").unwrap(), 600);
        assert!(parse_interval("0m").is_err());
        assert!(parse_interval("ten minutes").is_err());
    }

    #[test]
    fn test_parse_interval_rejects_overflow() {
        assert!(parse_interval("99999999999999999h").is_err());
        assert!(parse_interval("999999999999999999m").is_err());
        assert!(parse_interval("9999999999999999d").is_err());
        assert_eq!(parse_interval("5124095576030431h").unwrap(), 5_124_095_576_030_431 * 3600);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(600), "10m");
        assert_eq!(format_interval(3600), "1h");
        assert_eq!(format_interval(86400), "1d");
        assert_eq!(format_interval(90), "90s");
    }

    #[test]
    fn test_cron_expression() {
        assert_eq!(cron_expression(DEFAULT_INTERVAL_SECS), "*/10 * * * *");
        assert_eq!(cron_expression(60), "* * * * *");
        assert_eq!(cron_expression(3600), "0 * * * *");
        assert_eq!(cron_expression(6 * 3600), "0 */6 * * *");
        assert_eq!(cron_expression(86400), "0 0 * * *");
        assert_eq!(cron_expression(30), "*/30 * * * * *");
        assert_eq!(cron_expression(15 * 60), "*/15 * * * *");
        assert_eq!(cron_expression(8 * 3600), "0 */8 * * *");
    }

    #[test]
    fn test_cron_expression_falls_back_for_uneven_steps() {
        assert_eq!(cron_expression(90), "@every 90s");
        assert_eq!(cron_expression(45), "@every 45s");
        assert_eq!(cron_expression(7 * 60), "@every 7m");
        assert_eq!(cron_expression(90 * 60), "@every 90m");
        assert_eq!(cron_expression(5 * 3600), "@every 5h");
        assert_eq!(cron_expression(2 * 86400), "@every 2d");
    }

    #[test]
    fn test_describe_interval() {
        assert_eq!(describe_interval(600), "Every 10 minutes");
        assert_eq!(describe_interval(60), "Every minute");
        assert_eq!(describe_interval(7200), "Every 2 hours");
        assert_eq!(describe_interval(45), "Every 45 seconds");
    }

    #[test]
    fn test_next_tick_delay_is_calendar_aligned() {
        let now = Utc.with_ymd_and_hms(2026, 1, 14, 9, 43, 30).unwrap();
        assert_eq!(next_tick_delay(now, 600), Duration::from_secs(6 * 60 + 30));

        let on_boundary = Utc.with_ymd_and_hms(2026, 1, 14, 9, 50, 0).unwrap();
        assert_eq!(next_tick_delay(on_boundary, 600), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_start_runs_immediately_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (scheduler, store) = scheduler(&dir, 3600, true);

        assert!(!scheduler.is_active());
        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_active());

        assert!(wait_for_snapshot(&store, Category::Climatology, Duration::from_secs(5)).await);

        assert!(scheduler.stop().await);
        assert!(!scheduler.is_active());
        assert!(!scheduler.stop().await);
    }

    #[tokio::test]
    async fn test_ticks_run_without_initial_run() {
        let dir = TempDir::new().unwrap();
        let (scheduler, store) = scheduler(&dir, 1, false);

        scheduler.start();
        assert!(wait_for_snapshot(&store, Category::Gauge, Duration::from_secs(5)).await);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_no_initial_run_when_disabled() {
        let dir = TempDir::new().unwrap();
        let (scheduler, store) = scheduler(&dir, 3600, false);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.load(Category::Gauge).is_none());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let dir = TempDir::new().unwrap();
        let (scheduler, _store) = scheduler(&dir, 3600, false);

        assert!(scheduler.start());
        assert!(scheduler.stop().await);
        assert!(scheduler.start());
        assert!(scheduler.is_active());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_status() {
        let dir = TempDir::new().unwrap();
        let (scheduler, _store) = scheduler(&dir, DEFAULT_INTERVAL_SECS, false);

        let status = scheduler.status();
        assert!(!status.active);
        assert_eq!(status.schedule, "*/10 * * * *");
        assert_eq!(status.interval, "10m");
        assert_eq!(status.description, "Every 10 minutes");
        assert_eq!(status.data_dir, dir.path());

        scheduler.start();
        assert!(scheduler.status().active);
        scheduler.stop().await;
    }
}

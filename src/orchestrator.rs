//! Sequential scrape runs across station categories.
//!
//! One run visits the categories of its [`RunPolicy`] in order, pausing
//! between them, and reports an [`Outcome`] for every category. A failure or
//! panic while scraping one category never stops the remaining ones, and the
//! previous snapshot of a failed category is left in place.
//!
//! Runs are serialized by a process-wide run lock and, when configured, by a
//! [`DataDirLock`] shared with other processes writing the same data
//! directory. [`Orchestrator::run_all`] waits for an in-flight run,
//! [`Orchestrator::try_run_all`] gives up instead.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, warn, Instrument};

use crate::app::{PosmonError, Result};
use crate::domain::{Category, Outcome, RunReport, Snapshot};
use crate::scraper::{SessionManager, TableExtractor};
use crate::store::{DataDirGuard, DataDirLock, SnapshotStore};

/// Which categories a run visits and how long it pauses between them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPolicy {
    pub order: Vec<Category>,
    pub step_delay: Duration,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            order: Category::ALL.to_vec(),
            step_delay: Duration::from_secs(2),
        }
    }
}

impl RunPolicy {
    /// Default order without pauses
    pub fn immediate() -> Self {
        Self {
            step_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

pub struct Orchestrator {
    sessions: Arc<dyn SessionManager>,
    store: Arc<dyn SnapshotStore>,
    source_url: String,
    policy: RunPolicy,
    run_lock: Mutex<()>,
    dir_lock: Option<DataDirLock>,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<dyn SessionManager>,
        store: Arc<dyn SnapshotStore>,
        source_url: impl Into<String>,
        policy: RunPolicy,
    ) -> Self {
        Self {
            sessions,
            store,
            source_url: source_url.into(),
            policy,
            run_lock: Mutex::new(()),
            dir_lock: None,
        }
    }

    /// Also hold `lock` for the duration of every run
    pub fn with_dir_lock(mut self, lock: DataDirLock) -> Self {
        self.dir_lock = Some(lock);
        self
    }

    pub fn policy(&self) -> &RunPolicy {
        &self.policy
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Whether a run currently holds the run lock
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Scrape every category of the policy, waiting for any in-flight run
    /// to finish first
    pub async fn run_all(&self) -> RunReport {
        self.run_categories(&self.policy.order).await
    }

    /// Like [`run_all`](Self::run_all), but returns `None` right away if a
    /// run is already in progress in this or another process
    pub async fn try_run_all(&self) -> Option<RunReport> {
        let _guard = self.run_lock.try_lock().ok()?;
        let categories = &self.policy.order;

        let _dir_guard = match &self.dir_lock {
            Some(lock) => match lock.try_acquire() {
                Ok(Some(guard)) => Some(guard),
                Ok(None) => return None,
                Err(e) => return Some(lock_failure(categories, e)),
            },
            None => None,
        };
        Some(self.run_locked(categories).await)
    }

    /// Scrape the given categories in the given order
    pub async fn run_categories(&self, categories: &[Category]) -> RunReport {
        let _guard = self.run_lock.lock().await;
        let _dir_guard = match self.lock_data_dir().await {
            Ok(guard) => guard,
            Err(e) => return lock_failure(categories, e),
        };
        self.run_locked(categories).await
    }

    /// Scrape a single category
    pub async fn scrape_category(&self, category: Category) -> Outcome {
        let _guard = self.run_lock.lock().await;
        let _dir_guard = match self.lock_data_dir().await {
            Ok(guard) => guard,
            Err(e) => return Outcome::failed(e),
        };
        self.run_isolated(category).await
    }

    async fn lock_data_dir(&self) -> Result<Option<DataDirGuard>> {
        match &self.dir_lock {
            Some(lock) => lock.acquire().await.map(Some),
            None => Ok(None),
        }
    }

    async fn run_locked(&self, categories: &[Category]) -> RunReport {
        let started = Utc::now();
        info!("Starting scrape run ({} categories)", categories.len());

        let mut report = RunReport::new();
        for (i, &category) in categories.iter().enumerate() {
            if i > 0 && !self.policy.step_delay.is_zero() {
                tokio::time::sleep(self.policy.step_delay).await;
            }
            let outcome = self.run_isolated(category).await;
            report.insert(category, outcome);
        }

        let elapsed = Utc::now().signed_duration_since(started);
        info!(
            "Scrape run complete: {} records, {} failures ({:.1}s)",
            report.total_records(),
            report.failures(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );
        report
    }

    /// Run one category, turning errors and panics into a failed outcome
    async fn run_isolated(&self, category: Category) -> Outcome {
        let span = info_span!("scrape", category = category.key());
        let attempt = AssertUnwindSafe(self.scrape_and_save(category)).catch_unwind();

        match attempt.instrument(span).await {
            Ok(Ok(records)) => Outcome::succeeded(records),
            Ok(Err(e)) => {
                warn!("{} scrape failed: {}", category.label(), e);
                Outcome::failed(e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("{} scrape panicked: {}", category.label(), message);
                Outcome::failed(PosmonError::Other(format!("scrape panicked: {}", message)))
            }
        }
    }

    async fn scrape_and_save(&self, category: Category) -> Result<usize> {
        let records = TableExtractor::new(category)
            .scrape(self.sessions.as_ref(), &self.source_url)
            .await?;

        let snapshot = Snapshot::new(category, self.source_url.as_str(), records, Utc::now());
        self.store.save(&snapshot)?;
        Ok(snapshot.total_records)
    }
}

fn lock_failure(categories: &[Category], error: PosmonError) -> RunReport {
    warn!("Could not lock data directory: {}", error);
    let mut report = RunReport::new();
    for &category in categories {
        report.insert(category, Outcome::failed(format!("data directory lock: {}", error)));
    }
    report
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::keys;
    use crate::scraper::testing::{self, FixtureSessions};
    use crate::store::FileSnapshotStore;
    use tempfile::TempDir;

    fn orchestrator(sessions: FixtureSessions, dir: &TempDir) -> (Orchestrator, Arc<FileSnapshotStore>) {
        let store = Arc::new(FileSnapshotStore::new(dir.path()).unwrap());
        let orchestrator = Orchestrator::new(
            Arc::new(sessions),
            store.clone(),
            testing::SOURCE_URL,
            RunPolicy::immediate(),
        )
        .with_dir_lock(DataDirLock::new(dir.path()));
        (orchestrator, store)
    }

    #[test]
    fn test_default_policy() {
        let policy = RunPolicy::default();
        assert_eq!(policy.order, vec![Category::Gauge, Category::Rainfall, Category::Climatology]);
        assert_eq!(policy.step_delay, Duration::from_secs(2));
        assert!(RunPolicy::immediate().step_delay.is_zero());
    }

    #[tokio::test]
    async fn test_run_all_saves_every_category() {
        let dir = TempDir::new().unwrap();
        let sessions = FixtureSessions::new(testing::full_page());
        let (orchestrator, store) = orchestrator(sessions.clone(), &dir);

        let report = orchestrator.run_all().await;

        assert!(report.all_succeeded());
        assert_eq!(report.len(), 3);
        assert_eq!(report.get(Category::Gauge).unwrap().records, 2);
        assert_eq!(report.get(Category::Rainfall).unwrap().records, 3);
        assert_eq!(report.get(Category::Climatology).unwrap().records, 1);

        for category in Category::ALL {
            let snapshot = store.load(category).unwrap();
            assert_eq!(snapshot.total_records, snapshot.data.len());
            assert_eq!(snapshot.source_url, testing::SOURCE_URL);
        }
        assert_eq!(sessions.acquired(), 3);
        assert_eq!(sessions.released(), 3);
    }

    #[tokio::test]
    async fn test_one_failing_category_does_not_affect_others() {
        let dir = TempDir::new().unwrap();

        // A first run populates all three snapshots
        let (first, store) = orchestrator(FixtureSessions::new(testing::full_page()), &dir);
        first.run_all().await;
        let previous_rainfall = store.load(Category::Rainfall).unwrap();

        // The second page lacks the rainfall table
        let page = testing::page(&[testing::gauge_table(), testing::climatology_table()]);
        let (second, store) = orchestrator(FixtureSessions::new(page), &dir);
        let report = second.run_all().await;

        assert_eq!(report.len(), 3);
        assert!(report.get(Category::Gauge).unwrap().success);
        assert!(report.get(Category::Climatology).unwrap().success);

        let rainfall = report.get(Category::Rainfall).unwrap();
        assert!(!rainfall.success);
        assert_eq!(rainfall.records, 0);
        assert!(rainfall.error.as_deref().unwrap().contains("#arr-table"));

        let kept = store.load(Category::Rainfall).unwrap();
        assert_eq!(kept.timestamp, previous_rainfall.timestamp);
        assert_eq!(kept.total_records, 3);
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported_per_category() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, store) = orchestrator(FixtureSessions::failing_launch(), &dir);

        let report = orchestrator.run_all().await;

        assert_eq!(report.failures(), 3);
        for (_, outcome) in report.iter() {
            assert!(outcome.error.as_deref().unwrap().contains("launch"));
        }
        assert!(store.load(Category::Gauge).is_none());
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let dir = TempDir::new().unwrap();
        let sessions = FixtureSessions::new(testing::full_page()).panicking_on("#arr-table");
        let (orchestrator, store) = orchestrator(sessions, &dir);

        let report = orchestrator.run_all().await;

        let rainfall = report.get(Category::Rainfall).unwrap();
        assert!(!rainfall.success);
        assert!(rainfall.error.as_deref().unwrap().contains("panicked"));
        assert!(report.get(Category::Gauge).unwrap().success);
        assert!(report.get(Category::Climatology).unwrap().success);
        assert!(store.load(Category::Climatology).is_some());
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_save_failure_becomes_failed_outcome() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, store) = orchestrator(FixtureSessions::new(testing::full_page()), &dir);

        // A directory squatting on the target path makes the rename fail
        std::fs::create_dir(dir.path().join(Category::Gauge.file_name())).unwrap();

        let report = orchestrator.run_all().await;
        assert!(!report.get(Category::Gauge).unwrap().success);
        assert!(report.get(Category::Rainfall).unwrap().success);
        assert!(store.load(Category::Rainfall).is_some());
    }

    #[tokio::test]
    async fn test_custom_order_and_single_category() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, store) = orchestrator(FixtureSessions::new(testing::full_page()), &dir);

        let report = orchestrator
            .run_categories(&[Category::Climatology, Category::Gauge])
            .await;
        assert_eq!(report.len(), 2);
        assert!(report.get(Category::Rainfall).is_none());

        let outcome = orchestrator.scrape_category(Category::Rainfall).await;
        assert_eq!(outcome, Outcome::succeeded(3));
        assert!(store.load(Category::Rainfall).is_some());
    }

    #[tokio::test]
    async fn test_try_run_all_skips_while_running() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, _store) = orchestrator(FixtureSessions::new(testing::full_page()), &dir);

        let guard = orchestrator.run_lock.lock().await;
        assert!(orchestrator.is_running());
        assert!(orchestrator.try_run_all().await.is_none());
        drop(guard);

        assert!(!orchestrator.is_running());
        let report = orchestrator.try_run_all().await.unwrap();
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn test_rainfall_snapshot_end_to_end() {
        let dir = TempDir::new().unwrap();
        let page = testing::page(&[testing::rainfall_table(&[
            ("PCH Mentukul", "12.5"),
            ("PCH Kace", "-"),
            ("PCH Jeriji", "12.9"),
        ])]);
        let (orchestrator, store) = orchestrator(FixtureSessions::new(page), &dir);

        let outcome = orchestrator.scrape_category(Category::Rainfall).await;
        assert_eq!(outcome, Outcome::succeeded(3));

        let snapshot = store.load(Category::Rainfall).unwrap();
        assert_eq!(snapshot.total_records, 3);
        assert_eq!(snapshot.data.len(), 3);
        assert_eq!(snapshot.data[1].station_name(), Some("PCH Kace"));
        assert_eq!(snapshot.data[1].get(keys::BATTERY), Some("0"));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path(Category::Rainfall)).unwrap()).unwrap();
        assert_eq!(raw["total_records"], 3);
        assert_eq!(raw["data"][1]["BATERAI(volt)"], "0");
        assert_eq!(raw["data"][1]["AKUMULASI 1 HARI"], "4.5");
    }

    #[tokio::test]
    async fn test_runs_in_other_instances_are_excluded() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, store) = orchestrator(FixtureSessions::new(testing::full_page()), &dir);

        // Another process holding the data directory
        let other = DataDirLock::new(dir.path()).try_acquire().unwrap().unwrap();

        assert!(orchestrator.try_run_all().await.is_none());
        let waited = tokio::time::timeout(Duration::from_millis(300), orchestrator.run_all()).await;
        assert!(waited.is_err());
        assert!(store.load(Category::Gauge).is_none());

        drop(other);
        let report = tokio::time::timeout(Duration::from_secs(5), orchestrator.run_all())
            .await
            .unwrap();
        assert!(report.all_succeeded());
        assert!(store.load(Category::Gauge).is_some());
    }
}

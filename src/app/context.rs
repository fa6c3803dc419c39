use std::sync::Arc;

use crate::app::error::{PosmonError, Result};
use crate::config::Config;
use crate::domain::{Category, RunReport, Snapshot};
use crate::facade::DataAccess;
use crate::orchestrator::Orchestrator;
use crate::scheduler::{Scheduler, SchedulerStatus};
use crate::scraper::{ChromeSessionManager, SessionManager};
use crate::store::{DataDirLock, FileSnapshotStore};

/// Composition root wiring sessions, store, orchestrator and scheduler
pub struct AppContext {
    pub config: Config,
    pub store: Arc<FileSnapshotStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Scheduler,
    pub data: DataAccess,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let sessions = Arc::new(ChromeSessionManager::new(config.scraper.clone()));
        Self::with_sessions(config, sessions)
    }

    pub fn with_sessions(config: Config, sessions: Arc<dyn SessionManager>) -> Result<Self> {
        let interval_secs = config
            .schedule
            .interval_secs()
            .map_err(|e| PosmonError::Config(e.to_string()))?;

        let store = Arc::new(FileSnapshotStore::new(&config.storage.data_dir)?);
        let orchestrator = Arc::new(Orchestrator::new(
            sessions,
            store.clone(),
            config.scraper.source_url.clone(),
            config.schedule.run_policy(),
        )
        .with_dir_lock(DataDirLock::new(&config.storage.data_dir)));
        let scheduler = Scheduler::new(
            orchestrator.clone(),
            interval_secs,
            config.schedule.run_on_start,
            &config.storage.data_dir,
        );
        let data = DataAccess::new(store.clone());

        Ok(Self {
            config,
            store,
            orchestrator,
            scheduler,
            data,
        })
    }

    /// Scrape every category now, waiting for an in-flight run first
    pub async fn run_now(&self) -> RunReport {
        self.orchestrator.run_all().await
    }

    /// Latest snapshot of `category` without scraping
    pub fn get_latest(&self, category: Category) -> Option<Snapshot> {
        self.data.latest(category)
    }

    pub fn get_status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }
}

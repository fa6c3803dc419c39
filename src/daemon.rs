//! Foreground scheduling process.
//!
//! Runs the scheduler until SIGINT or SIGTERM (Ctrl-C on Windows). A PID file
//! in the data directory ensures only one scheduling process writes to a
//! given set of snapshot files.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::{AppContext, PosmonError, Result};
use crate::scheduler::format_interval;

pub const PID_FILE_NAME: &str = "posmon.pid";

/// State of the scheduling process for a data directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Running(u32),
    Stale(u32),
    NotRunning,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonState::Running(pid) => write!(f, "Daemon is running (PID: {})", pid),
            DaemonState::Stale(_) => write!(f, "Daemon is not running (stale PID file)"),
            DaemonState::NotRunning => write!(f, "Daemon is not running"),
        }
    }
}

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Get the PID file path for a data directory
    pub fn pid_file_path(data_dir: &Path) -> PathBuf {
        data_dir.join(PID_FILE_NAME)
    }

    fn read_pid(data_dir: &Path) -> Option<u32> {
        fs::read_to_string(Self::pid_file_path(data_dir))
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    pub fn state(data_dir: &Path) -> DaemonState {
        match Self::read_pid(data_dir) {
            Some(pid) if process_exists(pid) => DaemonState::Running(pid),
            Some(pid) => DaemonState::Stale(pid),
            None => DaemonState::NotRunning,
        }
    }

    /// Check if another daemon is already running for `data_dir`
    pub fn is_running(data_dir: &Path) -> bool {
        matches!(Self::state(data_dir), DaemonState::Running(_))
    }

    fn data_dir(&self) -> &Path {
        &self.ctx.config.storage.data_dir
    }

    fn write_pid_file(&self) -> std::io::Result<()> {
        let pid_path = Self::pid_file_path(self.data_dir());
        if let Some(parent) = pid_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&pid_path)?;
        writeln!(file, "{}", std::process::id())
    }

    fn remove_pid_file(&self) {
        let _ = fs::remove_file(Self::pid_file_path(self.data_dir()));
    }

    /// Run the scheduler until a shutdown signal arrives
    pub async fn run(&self) -> Result<()> {
        if let DaemonState::Running(pid) = Self::state(self.data_dir()) {
            return Err(PosmonError::Other(format!(
                "Another daemon instance is already running for {} (PID {})",
                self.data_dir().display(),
                pid
            )));
        }

        self.write_pid_file()
            .map_err(|e| PosmonError::Other(format!("Failed to write PID file: {}", e)))?;

        info!(
            "posmon daemon started (interval: {}, data dir: {}, PID: {})",
            format_interval(self.ctx.scheduler.interval_secs()),
            self.data_dir().display(),
            std::process::id()
        );

        self.ctx.scheduler.start();
        let waited = wait_for_shutdown().await;

        info!("Daemon shutting down...");
        self.ctx.scheduler.stop().await;
        self.remove_pid_file();

        waited
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(windows)]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    Ok(())
}

#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Stop the daemon for `data_dir` by signalling the PID from its PID file
pub fn stop_daemon(data_dir: &Path) -> std::result::Result<u32, String> {
    let pid_path = Daemon::pid_file_path(data_dir);

    if !pid_path.exists() {
        return Err("No daemon is running (PID file not found)".to_string());
    }

    let pid = Daemon::read_pid(data_dir).ok_or_else(|| "Invalid PID in PID file".to_string())?;

    if !process_exists(pid) {
        warn!("Removing stale PID file for PID {}", pid);
        let _ = fs::remove_file(&pid_path);
        return Err(format!("Daemon is not running (stale PID {})", pid));
    }

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .map_err(|e| format!("Failed to send signal: {}", e))?;

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()
        .map_err(|e| format!("Failed to stop process: {}", e))?;

    if status.success() {
        let _ = fs::remove_file(&pid_path);
        Ok(pid)
    } else {
        Err(format!("Failed to stop daemon (PID {})", pid))
    }
}

/// Check daemon status for `data_dir`
pub fn daemon_status(data_dir: &Path) -> DaemonState {
    Daemon::state(data_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::scraper::testing::{self, FixtureSessions};
    use tempfile::TempDir;

    // Above the largest pid_max Linux allows
    const UNUSED_PID: u32 = 4_194_305;

    #[test]
    fn test_pid_file_lives_in_data_dir() {
        let path = Daemon::pid_file_path(Path::new("/srv/posmon/data"));
        assert_eq!(path, PathBuf::from("/srv/posmon/data/posmon.pid"));
    }

    #[test]
    fn test_status_without_pid_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(daemon_status(dir.path()), DaemonState::NotRunning);
        assert!(stop_daemon(dir.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_status_with_live_and_stale_pid() {
        let dir = TempDir::new().unwrap();
        let pid_path = Daemon::pid_file_path(dir.path());

        fs::write(&pid_path, format!("{}\n", std::process::id())).unwrap();
        assert_eq!(daemon_status(dir.path()), DaemonState::Running(std::process::id()));

        fs::write(&pid_path, format!("{}\n", UNUSED_PID)).unwrap();
        assert_eq!(daemon_status(dir.path()), DaemonState::Stale(UNUSED_PID));
        assert!(stop_daemon(dir.path()).is_err());
        assert!(!pid_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_refuses_second_instance() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        let ctx = AppContext::with_sessions(config, Arc::new(FixtureSessions::new(testing::full_page()))).unwrap();

        fs::write(Daemon::pid_file_path(dir.path()), std::process::id().to_string()).unwrap();

        let err = Daemon::new(Arc::new(ctx)).run().await.unwrap_err();
        assert!(err.to_string().contains("already running"));
    }
}

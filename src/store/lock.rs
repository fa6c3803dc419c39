use std::fs::{self, File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::app::Result;

pub const LOCK_FILE_NAME: &str = "posmon.lock";

const LOCK_POLL: Duration = Duration::from_millis(100);

/// Advisory lock on a data directory, shared by every posmon process that
/// writes snapshots there
#[derive(Debug, Clone)]
pub struct DataDirLock {
    path: PathBuf,
}

/// Held lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct DataDirGuard {
    _file: File,
}

impl DataDirLock {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(LOCK_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)?)
    }

    /// Take the lock if no other holder has it
    pub fn try_acquire(&self) -> Result<Option<DataDirGuard>> {
        let file = self.open()?;
        match file.try_lock() {
            Ok(()) => Ok(Some(DataDirGuard { _file: file })),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Error(e)) => Err(e.into()),
        }
    }

    /// Wait until the lock is free and take it
    pub async fn acquire(&self) -> Result<DataDirGuard> {
        let mut waiting = false;
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            if !waiting {
                info!("Waiting for another posmon process to finish its run");
                waiting = true;
            }
            tokio::time::sleep(LOCK_POLL).await;
        }
    }
}

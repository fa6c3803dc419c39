pub mod file;
pub mod lock;

use std::time::SystemTime;

use crate::app::Result;
use crate::domain::{Category, Snapshot};

pub use file::FileSnapshotStore;
pub use lock::{DataDirGuard, DataDirLock};

/// Metadata of a persisted snapshot file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFileInfo {
    pub size_bytes: u64,
    pub modified: Option<SystemTime>,
}

/// Single-generation snapshot persistence, one "latest" entry per category
pub trait SnapshotStore: Send + Sync {
    /// Delete the latest snapshot of `category`, returning how many files
    /// were removed. Deleting a missing snapshot is not an error.
    fn rotate(&self, category: Category) -> Result<usize>;

    /// Replace the latest snapshot of the snapshot's category
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Read the latest snapshot. Missing or unreadable data yields `None`.
    fn load(&self, category: Category) -> Option<Snapshot>;

    fn file_info(&self, category: Category) -> Option<SnapshotFileInfo>;
}

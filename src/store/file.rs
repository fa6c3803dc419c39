use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::app::{PosmonError, Result};
use crate::domain::{Category, Snapshot};
use crate::store::{SnapshotFileInfo, SnapshotStore};

/// Stores each category's snapshot as a pretty-printed JSON file
pub struct FileSnapshotStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSnapshotStore {
    /// Open a store rooted at `data_dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)?;
            info!("Created data directory: {}", data_dir.display());
        }

        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path(&self, category: Category) -> PathBuf {
        self.data_dir.join(category.file_name())
    }

    /// Write through a uniquely named temp file in the data directory, then
    /// rename it over the latest file. Concurrent writers never share a temp
    /// file and readers only ever see a complete file.
    fn write_atomically(&self, category: Category, contents: &str) -> Result<()> {
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", category.file_name()))
            .suffix(".tmp")
            .tempfile_in(&self.data_dir)?;

        temp.write_all(contents.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file().set_permissions(fs::Permissions::from_mode(0o644))?;
        }
        temp.as_file().sync_all()?;

        temp.persist(self.path(category)).map_err(|e| e.error)?;
        Ok(())
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn rotate(&self, category: Category) -> Result<usize> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| PosmonError::Other(format!("Snapshot store lock poisoned: {}", e)))?;

        match fs::remove_file(self.path(category)) {
            Ok(()) => {
                info!("Rotated file: {}", category.file_name());
                Ok(1)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let category = snapshot.category;
        let json = snapshot.to_json()?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| PosmonError::Other(format!("Snapshot store lock poisoned: {}", e)))?;

        self.write_atomically(category, &json)?;
        info!("Saved {} records to {}", snapshot.total_records, category.file_name());
        Ok(())
    }

    fn load(&self, category: Category) -> Option<Snapshot> {
        let path = self.path(category);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot yet: {}", path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        match Snapshot::from_json(category, &content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
                None
            }
        }
    }

    fn file_info(&self, category: Category) -> Option<SnapshotFileInfo> {
        let metadata = fs::metadata(self.path(category)).ok()?;
        Some(SnapshotFileInfo {
            size_bytes: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

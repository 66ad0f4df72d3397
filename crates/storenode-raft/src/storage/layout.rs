//! On-disk layout of one replication group

use std::fs;
use std::path::{Path, PathBuf};

use crate::{GroupId, RaftError};

/// Directories owned by one replication group
///
/// ```text
/// <root>/log/<group>
/// <root>/meta/<group>
/// <root>/snapshot/<group>   (only when snapshots are enabled)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    log_dir: PathBuf,
    meta_dir: PathBuf,
    snapshot_dir: Option<PathBuf>,
}

impl StorageLayout {
    pub fn new(root: impl AsRef<Path>, group: &GroupId, use_snapshot: bool) -> Self {
        let root = root.as_ref();
        Self {
            log_dir: root.join("log").join(group.as_str()),
            meta_dir: root.join("meta").join(group.as_str()),
            snapshot_dir: use_snapshot.then(|| root.join("snapshot").join(group.as_str())),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn snapshot_dir(&self) -> Option<&Path> {
        self.snapshot_dir.as_deref()
    }

    /// Create every directory of the layout. Existing directories are kept.
    pub fn create_dirs(&self) -> Result<(), RaftError> {
        let dirs = [Some(&self.log_dir), Some(&self.meta_dir), self.snapshot_dir.as_ref()];
        for dir in dirs.into_iter().flatten() {
            fs::create_dir_all(dir).map_err(|e| {
                RaftError::Initialization(format!("Failed to create dir {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

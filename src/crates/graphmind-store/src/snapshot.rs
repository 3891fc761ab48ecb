//! Numbered snapshot directories.
//!
//! Every backend exports the full graph after each successful write.
//! Files are named `snapshot_<counter>.<ext>` inside
//! `<parent>/snapshot_<run_index>/`; the counter is monotonic within a
//! run and resets on `init`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

/// Tracks the active snapshot directory and the monotonic file counter.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDir {
    current: Option<PathBuf>,
    counter: u64,
}

impl SnapshotDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `<parent>/snapshot_<run_index>` and reset the counter.
    pub fn rotate(&mut self, run_index: usize, parent: &Path) -> std::io::Result<()> {
        let dir = parent.join(format!("snapshot_{run_index}"));
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "Created snapshot directory");
        self.current = Some(dir);
        self.counter = 0;
        Ok(())
    }

    /// Path for the next snapshot file, advancing the counter.
    ///
    /// Returns `None` when `rotate` has not been called yet (snapshots
    /// are disabled until the store is initialized).
    pub fn next_file(&mut self, extension: &str) -> Option<PathBuf> {
        let dir = self.current.as_ref()?;
        let path = dir.join(format!("snapshot_{}.{}", self.counter, extension));
        self.counter += 1;
        Some(path)
    }

    /// Number of snapshots written since the last rotation.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// The active snapshot directory, if any.
    pub fn current_dir(&self) -> Option<&Path> {
        self.current.as_deref()
    }
}

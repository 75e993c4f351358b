//! Named snapshots of intermediate files.
//!
//! Restoring is a plain copy of each file, one after the other.
//! A crash in the middle of a restore leaves the work directory
//! partially restored, and there is no recovery from that.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{catalog::FileCatalog, error::Error, state::ProcessState};

/// Snapshots are stored in this subdirectory of the work directory
const CHECKPOINT_DIR: &str = ".checkpoints";

#[derive(Debug, Clone)]
struct Checkpoint {
    /// (working file, snapshot) pairs
    files: Vec<(PathBuf, PathBuf)>,
}

#[derive(Debug, Clone)]
pub struct CheckpointManager {
    root: PathBuf,
    checkpoints: HashMap<String, Checkpoint>,
}

impl CheckpointManager {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            root: work_dir.join(CHECKPOINT_DIR),
            checkpoints: HashMap::new(),
        }
    }

    /// Snapshots all existing files of given categories under `name`.
    /// A previous checkpoint of the same name is replaced.
    /// Returns the number of files in the snapshot.
    pub fn create(
        &mut self,
        name: &str,
        catalog: &FileCatalog,
        state: &ProcessState,
        categories: &[&str],
    ) -> Result<usize, Error> {
        let dir = self.root.join(name);
        std::fs::create_dir_all(&dir)?;

        let mut files = Vec::new();

        for category in categories.iter() {
            for path in catalog.files(category, state, true) {
                let Some(file_name) = path.file_name() else {
                    continue;
                };
                let snapshot = dir.join(file_name);
                std::fs::copy(&path, &snapshot)?;
                debug!("{} - snapshot {}", name, path.display());
                files.push((path, snapshot));
            }
        }

        if files.is_empty() {
            warn!("checkpoint \"{}\" is empty", name);
        }

        let size = files.len();
        self.checkpoints.insert(name.to_string(), Checkpoint { files });
        Ok(size)
    }

    /// Replaces the working files with the snapshot of `name`.
    pub fn restore(&self, name: &str) -> Result<usize, Error> {
        let checkpoint = self
            .checkpoints
            .get(name)
            .ok_or_else(|| Error::UnknownCheckpoint(name.to_string()))?;

        for (path, snapshot) in checkpoint.files.iter() {
            std::fs::copy(snapshot, path)?;
        }

        info!(
            "checkpoint \"{}\" restored ({} files)",
            name,
            checkpoint.files.len()
        );

        Ok(checkpoint.files.len())
    }

    /// True if a checkpoint exists under this name
    pub fn contains(&self, name: &str) -> bool {
        self.checkpoints.contains_key(name)
    }
}

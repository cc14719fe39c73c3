//! Atomic creation of artifacts.
//!
//! Artifacts are written to a hidden staging file next to their final path
//! and renamed into place once complete. A staged file that is never
//! persisted is removed when dropped, so an interrupted or rejected task
//! cannot leave a file behind that a later run would mistake for its output.

use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::debug;

use crate::error::Result;

/// A staging file for one artifact.
#[derive(Debug)]
pub struct StagedArtifact {
    staging: TempPath,
    target: PathBuf,
}

impl StagedArtifact {
    /// Create a staging file for `target`, creating parent directories as needed.
    pub fn new(target: &Path) -> Result<Self> {
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .suffix(".nc")
            .tempfile_in(&parent)?
            .into_temp_path();
        Ok(Self {
            staging,
            target: target.to_path_buf(),
        })
    }

    /// Where the artifact is being written.
    pub fn path(&self) -> &Path {
        &self.staging
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Move the finished artifact to its final path.
    pub fn persist(self) -> Result<PathBuf> {
        let target = self.target;
        self.staging.persist(&target).map_err(|e| e.error)?;
        debug!(path = %target.display(), "Persisted artifact");
        Ok(target)
    }

    /// Remove the staging file now, reporting any failure to do so.
    pub fn discard(self) -> Result<()> {
        debug!(path = %self.target.display(), "Discarding staged artifact");
        self.staging.close()?;
        Ok(())
    }
}

//! On-disk layout of per-job artifacts.
//!
//! Every path is derived from the job id and the stage directory, so two
//! jobs never share a path and a job's artifacts can be located without a
//! database lookup.

use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::job::JobId;

pub const DIR_INCOMING: &str = "incoming";
pub const DIR_NORMALISED: &str = "normalised";
pub const DIR_FRAMES: &str = "frames";
pub const DIR_COMPLETE: &str = "complete";

/// Container produced by normalisation and blurring.
pub const VIDEO_EXT: &str = "mp4";

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the four stage directories.
    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        for dir in [DIR_INCOMING, DIR_NORMALISED, DIR_FRAMES, DIR_COMPLETE] {
            let path = self.root.join(dir);
            std::fs::create_dir_all(&path)
                .map_err(|source| StorageError::CreateDirectory { path, source })?;
        }
        Ok(())
    }

    /// Where the ingestion step writes the upload.
    pub fn incoming(&self, id: JobId, ext: &str) -> PathBuf {
        let ext = ext.trim_start_matches('.');
        let name = if ext.is_empty() {
            id.to_string()
        } else {
            format!("{}.{}", id, ext)
        };
        self.root.join(DIR_INCOMING).join(name)
    }

    pub fn normalised(&self, id: JobId) -> PathBuf {
        self.root
            .join(DIR_NORMALISED)
            .join(format!("{}.{}", id, VIDEO_EXT))
    }

    /// Directory holding the sampled frames of one job.
    pub fn frames(&self, id: JobId) -> PathBuf {
        self.root.join(DIR_FRAMES).join(id.to_string())
    }

    /// The downloadable result.
    pub fn complete(&self, id: JobId) -> PathBuf {
        self.root
            .join(DIR_COMPLETE)
            .join(format!("{}.{}", id, VIDEO_EXT))
    }
}

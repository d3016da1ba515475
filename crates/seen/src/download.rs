//! Download authorization for completed outputs.
//!
//! The origin check is a coarse anti-leeching control: it trusts the
//! address the transport reports and does not defend against a spoofed
//! origin.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::DownloadError;
use crate::job::{JobId, Status};
use crate::pipeline::StorageLayout;
use crate::store::JobStore;

/// A completed output released to its owner.
#[derive(Debug)]
pub struct Release {
    pub id: JobId,
    pub path: PathBuf,
    pub file: File,
    pub len: u64,
}

pub struct DownloadAuthorizer {
    store: Arc<dyn JobStore>,
    layout: StorageLayout,
}

impl DownloadAuthorizer {
    pub fn new(store: Arc<dyn JobStore>, layout: StorageLayout) -> Self {
        Self { store, layout }
    }

    /// Releases the output of `raw_id` to `origin`.
    ///
    /// A malformed id is rejected before the store is consulted. Unknown
    /// jobs and foreign origins both answer [`DownloadError::Forbidden`].
    pub fn authorize(&self, raw_id: &str, origin: &str) -> Result<Release, DownloadError> {
        let id = JobId::parse(raw_id)?;

        if !self.store.matches_origin(id, origin) {
            warn!("refused download of {} to {}", id, origin);
            return Err(DownloadError::Forbidden);
        }

        let status = self.store.status(id)?;
        if status != Status::Complete {
            return Err(DownloadError::NotReady { id, status });
        }

        let path = self.layout.complete(id);
        let file = File::open(&path).map_err(|source| DownloadError::Unavailable { id, source })?;
        let len = file
            .metadata()
            .map_err(|source| DownloadError::Unavailable { id, source })?
            .len();

        debug!("releasing {} ({} bytes) to {}", path.display(), len, origin);
        Ok(Release { id, path, file, len })
    }
}

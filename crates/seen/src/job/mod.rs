pub mod id;
pub mod status;

pub use id::JobId;
pub use status::{advance, Status, TransitionError, DISPATCHABLE_STATUSES, PERSISTED_STATUSES};

/// A queue entry: the job to work on and the stage it was queued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Job {
    pub id: JobId,
    pub status: Status,
}

impl Job {
    pub fn new(id: JobId, status: Status) -> Self {
        Self { id, status }
    }
}

/// A freshly ingested job, as handed to the store by the upload step.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    /// Network origin that submitted the upload.
    pub origin: String,
    /// Extension of the uploaded file, without the leading dot.
    pub source_ext: String,
}

impl NewJob {
    pub fn new(id: JobId, origin: impl Into<String>, source_ext: impl Into<String>) -> Self {
        let source_ext = source_ext.into();
        Self {
            id,
            origin: origin.into(),
            source_ext: source_ext.trim_start_matches('.').to_string(),
        }
    }

    /// The extension becomes part of a file name under the incoming
    /// directory, so it may only hold ASCII letters and digits.
    pub fn has_valid_extension(&self) -> bool {
        self.source_ext.len() <= MAX_EXT_LEN
            && self.source_ext.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

const MAX_EXT_LEN: usize = 16;

/// The persisted view of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: JobId,
    pub status: Status,
    pub origin: String,
    pub source_ext: String,
    pub guide_data: Option<String>,
    pub error: Option<String>,
}

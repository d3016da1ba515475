use thiserror::Error;

use crate::job::JobId;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no guide data recorded for job {0}")]
    MissingGuideData(JobId),

    #[error("missing output: {0}")]
    MissingOutput(String),
}

use std::path::PathBuf;
use thiserror::Error;

use crate::job::{JobId, Status, TransitionError};

#[derive(Error, Debug)]
pub enum SeenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Invoker error: {0}")]
    Invoker(#[from] InvokerError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error(transparent)]
    InvalidJobId(#[from] InvalidJobId),

    #[error("Invalid guide data: {0}")]
    InvalidGuideData(String),

    #[error("Failed to install signal handler: {0}")]
    Signal(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid job id '{value}': {reason}")]
pub struct InvalidJobId {
    pub value: String,
    pub reason: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is at capacity. The job was not enqueued.
    #[error("Job queue is full ({capacity} pending)")]
    Full { capacity: usize },

    #[error("Job queue closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    /// A compare-and-set found the job in a different status.
    #[error("Job {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: JobId,
        expected: Status,
        actual: Status,
    },

    #[error("Invalid source extension '{0}'")]
    InvalidSourceExt(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum InvokerError {
    #[error("Failed to start invoker runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Reasons a download is refused. None of them reveal whether the job exists
/// to a requester whose origin does not match.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    MalformedId(#[from] InvalidJobId),

    #[error("Origin not permitted")]
    Forbidden,

    /// The requester owns the job but it has not completed.
    #[error("Job {id} is {status}, not complete")]
    NotReady { id: JobId, status: Status },

    #[error("Output for job {id} is unavailable: {source}")]
    Unavailable {
        id: JobId,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SeenError>;

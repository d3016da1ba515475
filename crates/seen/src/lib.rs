pub mod config;
pub mod db;
pub mod download;
pub mod engine;
pub mod error;
pub mod events;
pub mod invoker;
pub mod job;
pub mod logging;
pub mod origin;
pub mod pipeline;
pub mod queue;
pub mod store;
pub mod worker;

pub use config::{load_config, Config};
pub use download::{DownloadAuthorizer, Release};
pub use engine::{Engine, EngineBuilder, StatusReport};
pub use error::{
    ConfigError, DownloadError, InvalidJobId, QueueError, Result, SeenError, StorageError,
    StoreError,
};
pub use events::StageEvent;
pub use invoker::{CommandInvoker, Outcome, ProcessInvoker};
pub use job::{Job, JobId, JobRecord, NewJob, Status};
pub use pipeline::{EngineSettings, Pipeline, StageTable, StorageLayout};
pub use queue::JobQueue;
pub use store::{JobStore, SqliteJobStore};

//! The engine facade: owns the queue, the worker pool and the download
//! authorizer, and accepts the inbound "job created" and "annotation
//! received" events from the ingestion and annotation collaborators.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::download::{DownloadAuthorizer, Release};
use crate::error::{DownloadError, QueueError, Result, SeenError};
use crate::events::{self, EventSender, StageEvent};
use crate::invoker::ProcessInvoker;
use crate::job::{Job, JobId, NewJob, Status};
use crate::pipeline::{EngineSettings, Pipeline, StageTable, StorageLayout};
use crate::queue::JobQueue;
use crate::store::JobStore;
use crate::worker::WorkerPool;

const EVENT_CAPACITY: usize = 256;

/// What a client sees when it asks about a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    store: Arc<dyn JobStore>,
    invoker: Arc<dyn ProcessInvoker>,
    stages: Option<StageTable>,
}

impl EngineBuilder {
    /// Replaces the standard stage table.
    pub fn stages(mut self, stages: StageTable) -> Self {
        self.stages = Some(stages);
        self
    }

    pub fn start(self) -> Result<Engine> {
        let layout = StorageLayout::new(&self.settings.storage_directory);
        layout.ensure_dirs()?;

        let queue = JobQueue::new(self.settings.queue_capacity);
        let (events, _) = events::channel(EVENT_CAPACITY);
        let stages = self
            .stages
            .unwrap_or_else(|| StageTable::standard(&self.settings.tools));

        let pipeline = Pipeline::new(
            Arc::clone(&self.store),
            queue.clone(),
            self.invoker,
            stages,
            layout.clone(),
        )
        .verify_outputs(self.settings.verify_outputs)
        .with_events(Arc::clone(&events));

        let pool = WorkerPool::start(Arc::new(pipeline), self.settings.worker_count);

        info!(
            storage = %layout.root().display(),
            workers = pool.worker_count(),
            capacity = queue.capacity(),
            "engine started"
        );

        Ok(Engine {
            downloads: DownloadAuthorizer::new(Arc::clone(&self.store), layout.clone()),
            store: self.store,
            queue,
            layout,
            events,
            pool,
        })
    }
}

pub struct Engine {
    store: Arc<dyn JobStore>,
    queue: JobQueue,
    layout: StorageLayout,
    downloads: DownloadAuthorizer,
    events: EventSender,
    pool: WorkerPool,
}

impl Engine {
    pub fn builder(
        settings: EngineSettings,
        store: Arc<dyn JobStore>,
        invoker: Arc<dyn ProcessInvoker>,
    ) -> EngineBuilder {
        EngineBuilder {
            settings,
            store,
            invoker,
            stages: None,
        }
    }

    /// Starts an engine with the standard stages.
    pub fn start(
        settings: EngineSettings,
        store: Arc<dyn JobStore>,
        invoker: Arc<dyn ProcessInvoker>,
    ) -> Result<Self> {
        Self::builder(settings, store, invoker).start()
    }

    /// Where the ingestion step must place uploads before calling [`submit`].
    ///
    /// [`submit`]: Engine::submit
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Records a freshly uploaded job and queues it for normalization.
    ///
    /// A full queue is reported as [`QueueError::Full`]; the job is already
    /// persisted as `Incoming` and is picked up again by [`recover`].
    ///
    /// [`recover`]: Engine::recover
    pub fn submit(&self, job: &NewJob) -> Result<()> {
        self.store.create(job)?;
        self.queue.try_push(Job::new(job.id, Status::Incoming))?;
        info!(job_id = %job.id, origin = %job.origin, "job submitted");
        Ok(())
    }

    /// Stores guide data for a prepped job and queues it for blurring.
    pub fn annotate(&self, raw_id: &str, guide_data: &str) -> Result<()> {
        let id = JobId::parse(raw_id)?;
        if guide_data.trim().is_empty() {
            return Err(SeenError::InvalidGuideData(format!(
                "empty guide data for job {}",
                id
            )));
        }

        self.store.write_guide_data(id, guide_data)?;
        self.queue.try_push(Job::new(id, Status::Annotated))?;
        info!(job_id = %id, "annotation received");
        Ok(())
    }

    /// Current status and, once failed, the recorded message.
    /// Ids the store does not know report `Unknown`.
    pub fn status(&self, raw_id: &str) -> Result<StatusReport> {
        let id = JobId::parse(raw_id)?;
        let report = match self.store.find(id)? {
            Some(record) => StatusReport {
                status: record.status,
                error: record.error,
            },
            None => StatusReport {
                status: Status::Unknown,
                error: None,
            },
        };
        Ok(report)
    }

    pub fn download(
        &self,
        raw_id: &str,
        origin: &str,
    ) -> std::result::Result<Release, DownloadError> {
        self.downloads.authorize(raw_id, origin)
    }

    /// Re-enqueues every job left in a worker-dispatchable status, as after
    /// a restart. Stops early if the queue fills; the rest stay persisted.
    pub fn recover(&self) -> Result<usize> {
        let pending = self.store.pending()?;
        let total = pending.len();
        let mut queued = 0;

        for job in pending {
            match self.queue.try_push(job) {
                Ok(()) => queued += 1,
                Err(QueueError::Full { capacity }) => {
                    warn!(
                        "queue full ({}) during recovery, {} of {} jobs left for later",
                        capacity,
                        total - queued,
                        total
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if queued > 0 {
            info!("recovered {} pending jobs", queued);
        }
        Ok(queued)
    }

    /// Receives every transition committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.events.subscribe()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Stops workers after their current job.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.pool.is_shutdown()
    }

    /// Blocks until every worker has exited.
    pub fn wait(self) {
        self.pool.wait();
    }
}

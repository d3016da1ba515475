use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, info_span, warn};

use crate::error::QueueError;
use crate::events::{EventSender, StageEvent};
use crate::invoker::{Outcome, ProcessInvoker};
use crate::job::{advance, Job, JobRecord, Status};
use crate::queue::JobQueue;
use crate::store::JobStore;

use super::claims::InFlight;
use super::error::PipelineError;
use super::layout::StorageLayout;
use super::stage::{Artifact, StageCommand, StageHandler, StageInput, StageTable};

/// How long one re-enqueue attempt waits for room before re-checking shutdown.
const REQUEUE_WAIT: Duration = Duration::from_millis(250);

/// Why a dequeued entry was not worked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// No handler for the queued status.
    NotDispatchable,
    /// Another worker holds the job.
    InFlight,
    /// The store has no such job.
    Missing,
    /// The job has moved on since the entry was queued.
    Stale { persisted: Status },
}

/// The result of one pass of a worker over a queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageReport {
    Advanced {
        job: Job,
        to: Status,
        requeued: bool,
    },
    Failed {
        job: Job,
        message: String,
    },
    Skipped {
        job: Job,
        reason: Skip,
    },
    /// The store refused the transition; nothing was committed.
    Aborted {
        job: Job,
        error: String,
    },
}

/// A stage's completion: where the job goes and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub from: Status,
    pub next: Status,
    pub outcome: Outcome,
}

pub struct Pipeline {
    store: Arc<dyn JobStore>,
    queue: JobQueue,
    invoker: Arc<dyn ProcessInvoker>,
    stages: StageTable,
    layout: StorageLayout,
    verify_outputs: bool,
    in_flight: InFlight,
    events: Option<EventSender>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: JobQueue,
        invoker: Arc<dyn ProcessInvoker>,
        stages: StageTable,
        layout: StorageLayout,
    ) -> Self {
        Self {
            store,
            queue,
            invoker,
            stages,
            layout,
            verify_outputs: true,
            in_flight: InFlight::new(),
            events: None,
        }
    }

    /// Treat a zero exit without its expected artifact as a failure.
    pub fn verify_outputs(mut self, verify: bool) -> Self {
        self.verify_outputs = verify;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Works one queue entry to completion: run the stage, commit the new
    /// status, then re-enqueue if a worker owns the next stage.
    pub fn run(&self, job: Job, shutdown: &AtomicBool) -> StageReport {
        let _span = info_span!("stage", job_id = %job.id, status = %job.status).entered();

        let Some(handler) = self.stages.handler_for(job.status) else {
            warn!("ignoring job {} queued with status {}", job.id, job.status);
            return StageReport::Skipped {
                job,
                reason: Skip::NotDispatchable,
            };
        };

        let Some(claim) = self.in_flight.try_claim(job) else {
            debug!("{} of job {} already running on another worker", job.status, job.id);
            return StageReport::Skipped {
                job,
                reason: Skip::InFlight,
            };
        };

        let record = match self.store.find(job.id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!("job {} dequeued but not in store", job.id);
                return StageReport::Skipped {
                    job,
                    reason: Skip::Missing,
                };
            }
            Err(e) => {
                error!("error loading job {}: {}", job.id, e);
                return StageReport::Aborted {
                    job,
                    error: e.to_string(),
                };
            }
        };

        if record.status != job.status {
            debug!(
                "job {} queued as {} but is {}, dropping entry",
                job.id, job.status, record.status
            );
            return StageReport::Skipped {
                job,
                reason: Skip::Stale {
                    persisted: record.status,
                },
            };
        }

        info!("running {} for {}", handler.name(), job.id);
        let result = match self.execute(handler, &record) {
            Ok(result) => result,
            Err(e) => {
                error!("no transition for job {}: {}", job.id, e);
                return StageReport::Aborted {
                    job,
                    error: e.to_string(),
                };
            }
        };

        if let Err(e) = self.apply(job, &result) {
            error!(
                "failed to record {} -> {} for {}: {}",
                result.from, result.next, job.id, e
            );
            return StageReport::Aborted {
                job,
                error: e.to_string(),
            };
        }

        // Released before re-enqueueing so the next stage can be picked up
        // by any worker straight away.
        drop(claim);
        self.publish(job, &result);

        match result.outcome {
            Outcome::Failure(message) => {
                warn!("job {} failed in {}: {}", job.id, handler.name(), message);
                StageReport::Failed { job, message }
            }
            Outcome::Success => {
                let requeued = result.next.is_dispatchable()
                    && self.requeue(Job::new(job.id, result.next), shutdown);
                info!("job {} is now {}", job.id, result.next);
                StageReport::Advanced {
                    job,
                    to: result.next,
                    requeued,
                }
            }
        }
    }

    /// Runs one stage for `record` without touching the store or queue.
    pub fn execute(
        &self,
        handler: &dyn StageHandler,
        record: &JobRecord,
    ) -> Result<StageResult, crate::job::TransitionError> {
        let input = StageInput {
            id: record.id,
            source_ext: &record.source_ext,
            guide_data: record.guide_data.as_deref(),
        };

        let outcome = match handler.plan(&input, &self.layout) {
            Ok(command) => self.invoke(&command),
            Err(e) => Outcome::failure(e.to_string()),
        };

        let next = advance(record.status, &outcome)?;
        Ok(StageResult {
            from: record.status,
            next,
            outcome,
        })
    }

    fn invoke(&self, command: &StageCommand) -> Outcome {
        if let Artifact::Directory(dir) = &command.output {
            if let Err(e) = std::fs::create_dir_all(dir) {
                return Outcome::failure(format!("could not create {}: {}", dir.display(), e));
            }
        }

        let outcome = self.invoker.invoke(&command.tool, &command.args);

        if outcome.is_success() && self.verify_outputs && !command.output.is_present() {
            let name = command
                .output
                .path()
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            return Outcome::failure(PipelineError::MissingOutput(name).to_string());
        }

        outcome
    }

    fn apply(&self, job: Job, result: &StageResult) -> Result<(), crate::error::StoreError> {
        match &result.outcome {
            Outcome::Success => self.store.set_status(job.id, result.from, result.next),
            Outcome::Failure(message) => self.store.set_error(job.id, result.from, message),
        }
    }

    fn requeue(&self, job: Job, shutdown: &AtomicBool) -> bool {
        loop {
            match self.queue.push_timeout(job, REQUEUE_WAIT) {
                Ok(()) => return true,
                Err(QueueError::Full { capacity }) => {
                    if shutdown.load(Ordering::Relaxed) {
                        warn!(
                            "shutting down with job {} unqueued; it will be recovered on restart",
                            job.id
                        );
                        return false;
                    }
                    warn!("job queue full ({}), waiting to requeue {}", capacity, job.id);
                }
                Err(QueueError::Closed) => {
                    error!("job queue closed, cannot requeue {}", job.id);
                    return false;
                }
            }
        }
    }

    fn publish(&self, job: Job, result: &StageResult) {
        if let Some(events) = &self.events {
            let error = result.outcome.message().map(str::to_string);
            // No receivers is fine.
            let _ = events.send(StageEvent::new(job.id, result.from, result.next, error));
        }
    }
}

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info};

use crate::error::QueueError;
use crate::pipeline::{Pipeline, StageReport};

pub const DEFAULT_WORKER_COUNT: usize = 5;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed set of threads that drain the job queue through one pipeline.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` workers against `pipeline`'s queue.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn start(pipeline: Arc<Pipeline>, worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let pipeline = Arc::clone(&pipeline);
            let shutdown_flag = Arc::clone(&shutdown);

            let handle = thread::Builder::new()
                .name(format!("seen-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, pipeline, shutdown_flag));

            match handle {
                Ok(handle) => workers.push(handle),
                Err(e) => error!("Failed to start worker {}: {}", worker_id, e),
            }
        }

        info!("Started {} workers", workers.len());

        Self { workers, shutdown }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Asks workers to stop once their current job is done.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(worker_id: usize, pipeline: Arc<Pipeline>, shutdown: Arc<AtomicBool>) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match pipeline.queue().pop_timeout(POLL_INTERVAL) {
            Ok(Some(job)) => {
                debug!("Worker {} picked up {} ({})", worker_id, job.id, job.status);

                // A panicking stage must not take the worker down with it.
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(job, &shutdown)));
                match outcome {
                    Ok(StageReport::Aborted { job, error }) => {
                        error!("Worker {} aborted {}: {}", worker_id, job.id, error);
                    }
                    Ok(report) => debug!("Worker {} finished: {:?}", worker_id, report),
                    Err(_) => error!("Worker {} panicked while running {}", worker_id, job.id),
                }
            }
            Ok(None) => continue,
            Err(QueueError::Closed) => {
                debug!("Worker {} job queue disconnected", worker_id);
                break;
            }
            Err(e) => {
                error!("Worker {} failed to read queue: {}", worker_id, e);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

//! Bounded multi-producer multi-consumer job queue.
//!
//! Producers are the ingestion and annotation entry points and the workers
//! themselves. Ordering across jobs is not guaranteed to mean anything;
//! a job is never dropped silently: a full queue either blocks the caller
//! or hands the job back as [`QueueError::Full`].

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};

use crate::error::QueueError;
use crate::job::Job;

/// Default pending capacity.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Cloneable handle to one shared queue.
#[derive(Clone)]
pub struct JobQueue {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    capacity: usize,
}

impl JobQueue {
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be > 0");
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Enqueues without blocking. A full queue is reported to the caller.
    pub fn try_push(&self, job: Job) -> Result<(), QueueError> {
        self.sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => QueueError::Closed,
        })
    }

    /// Enqueues, waiting up to `timeout` for room.
    pub fn push_timeout(&self, job: Job, timeout: Duration) -> Result<(), QueueError> {
        self.sender.send_timeout(job, timeout).map_err(|e| match e {
            SendTimeoutError::Timeout(_) => QueueError::Full {
                capacity: self.capacity,
            },
            SendTimeoutError::Disconnected(_) => QueueError::Closed,
        })
    }

    /// Dequeues, waiting up to `timeout`. `Ok(None)` means nothing arrived.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<Job>, QueueError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => Ok(Some(job)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(QueueError::Closed),
        }
    }

    pub fn try_pop(&self) -> Option<Job> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

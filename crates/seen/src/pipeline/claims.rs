//! In-process claims on the stages workers are running.
//!
//! A claim covers one job at one status. A duplicate queue entry for the
//! same stage is skipped, while an entry for a later stage of the same job
//! (queued by the annotation entry point, say) is left to the stale check.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::job::Job;

#[derive(Clone, Default)]
pub struct InFlight {
    held: Arc<Mutex<HashSet<Job>>>,
}

/// Released on drop.
pub struct Claim {
    job: Job,
    held: Arc<Mutex<HashSet<Job>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `job`'s stage, or returns `None` if another worker runs it.
    pub fn try_claim(&self, job: Job) -> Option<Claim> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if held.insert(job) {
            Some(Claim {
                job,
                held: Arc::clone(&self.held),
            })
        } else {
            None
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.job);
    }
}

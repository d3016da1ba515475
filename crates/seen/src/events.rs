//! Stage transition events for live status consumers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{JobId, Status};

/// Published after a transition has been committed to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageEvent {
    pub job_id: JobId,
    pub from: Status,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StageEvent {
    pub fn new(job_id: JobId, from: Status, status: Status, error: Option<String>) -> Self {
        Self {
            job_id,
            from,
            status,
            error,
            timestamp: Utc::now(),
        }
    }
}

pub type EventSender = Arc<broadcast::Sender<StageEvent>>;

/// Creates a broadcaster. Slow receivers lag; senders never block.
pub fn channel(capacity: usize) -> (EventSender, broadcast::Receiver<StageEvent>) {
    let (tx, rx) = broadcast::channel(capacity);
    (Arc::new(tx), rx)
}

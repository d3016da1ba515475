//! Job status state machine.
//!
//! ```text
//! Incoming -> Normalised -> Prepped -> Annotated -> Complete
//!     \            \           \           \
//!      +------------+-----------+-----------+--> Error
//! ```
//!
//! `Prepped -> Annotated` is driven by the annotation entry point; every
//! other forward edge is driven by a worker. `Unknown` is never persisted,
//! it is what a status query answers for an id the store does not hold.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::invoker::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Unknown,
    /// Uploaded, waiting for conversion to a standard container.
    Incoming,
    /// Converted to a format the frame sampler understands.
    Normalised,
    /// Sampled into frames, waiting for annotation.
    Prepped,
    /// Guide data received, ready for blurring.
    Annotated,
    /// Blurring complete, artifact downloadable.
    Complete,
    Error,
}

/// Every status that may be written to the store.
pub const PERSISTED_STATUSES: [Status; 6] = [
    Status::Incoming,
    Status::Normalised,
    Status::Prepped,
    Status::Annotated,
    Status::Complete,
    Status::Error,
];

/// Statuses a worker knows how to advance.
pub const DISPATCHABLE_STATUSES: [Status; 3] =
    [Status::Incoming, Status::Normalised, Status::Annotated];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal status transition {from} -> {to}")]
    Illegal { from: Status, to: Status },

    #[error("status {0} is not advanced by a worker")]
    NotDispatchable(Status),

    /// Entering `to` requires guide data, which a plain status write lacks.
    #[error("{from} -> {to} must be written together with guide data")]
    NeedsGuideData { from: Status, to: Status },

    #[error("unrecognised status name '{0}'")]
    UnknownName(String),
}

impl Status {
    /// Stable name used in the status lookup table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Incoming => "incoming",
            Status::Normalised => "normalised",
            Status::Prepped => "prepped",
            Status::Annotated => "annotated",
            Status::Complete => "complete",
            Status::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Complete | Status::Error)
    }

    pub fn is_dispatchable(&self) -> bool {
        DISPATCHABLE_STATUSES.contains(self)
    }

    /// Position along the success path. `Error` and `Unknown` sit outside it.
    fn rank(&self) -> Option<u8> {
        match self {
            Status::Incoming => Some(0),
            Status::Normalised => Some(1),
            Status::Prepped => Some(2),
            Status::Annotated => Some(3),
            Status::Complete => Some(4),
            Status::Unknown | Status::Error => None,
        }
    }

    /// The next status on the success path.
    pub fn successor(&self) -> Option<Status> {
        match self {
            Status::Incoming => Some(Status::Normalised),
            Status::Normalised => Some(Status::Prepped),
            Status::Prepped => Some(Status::Annotated),
            Status::Annotated => Some(Status::Complete),
            Status::Unknown | Status::Complete | Status::Error => None,
        }
    }

    /// True when `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: Status) -> bool {
        if next == Status::Error {
            return !self.is_terminal() && *self != Status::Unknown;
        }
        self.successor() == Some(next)
    }

    /// True when `self` has reached or passed `other` on the success path.
    pub fn has_reached(&self, other: Status) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a >= b,
            _ => false,
        }
    }

    /// True when a job in this status must hold guide data.
    pub fn carries_guide_data(&self) -> bool {
        self.has_reached(Status::Annotated)
    }

    pub fn validate_transition(&self, next: Status) -> Result<(), TransitionError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TransitionError::Illegal {
                from: *self,
                to: next,
            })
        }
    }
}

impl Status {
    /// Checks a status-only write. Edges into a guide-carrying status are
    /// refused since only the guide data write may take them.
    pub fn validate_status_write(&self, next: Status) -> Result<(), TransitionError> {
        self.validate_transition(next)?;
        if next.carries_guide_data() && !self.carries_guide_data() {
            return Err(TransitionError::NeedsGuideData {
                from: *self,
                to: next,
            });
        }
        Ok(())
    }
}

/// Maps a worker-driven stage completion to the job's next status.
pub fn advance(current: Status, outcome: &Outcome) -> Result<Status, TransitionError> {
    if !current.is_dispatchable() {
        return Err(TransitionError::NotDispatchable(current));
    }

    match outcome {
        Outcome::Success => current
            .successor()
            .ok_or(TransitionError::NotDispatchable(current)),
        Outcome::Failure(_) => Ok(Status::Error),
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(Status::Incoming),
            "normalised" => Ok(Status::Normalised),
            "prepped" => Ok(Status::Prepped),
            "annotated" => Ok(Status::Annotated),
            "complete" => Ok(Status::Complete),
            "error" => Ok(Status::Error),
            "unknown" => Ok(Status::Unknown),
            other => Err(TransitionError::UnknownName(other.to_string())),
        }
    }
}

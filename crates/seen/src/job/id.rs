use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InvalidJobId;

/// Globally unique job identifier.
///
/// Also the correlation key for artifact paths, so only well-formed UUIDs
/// are accepted when parsing external input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an identifier supplied by a client.
    pub fn parse(raw: &str) -> Result<Self, InvalidJobId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidJobId {
                value: raw.to_string(),
                reason: "identifier is empty".to_string(),
            });
        }

        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|e| InvalidJobId {
                value: raw.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for JobId {
    type Err = InvalidJobId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated lowercase, the same form used for file names.
        write!(f, "{}", self.0.hyphenated())
    }
}

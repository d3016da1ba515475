//! Job store: the single source of truth for job status.
//!
//! [`JobStore`] is the seam the engine talks to; [`SqliteJobStore`] backs it
//! with the job repository. Status writes are compare-and-set on the
//! expected current status, so two actors racing on one job id cannot both
//! win, and a write that touches no row surfaces as a distinguishable
//! [`StoreError`] instead of vanishing.

use chrono::Utc;

use crate::db::job_repo::{self, JobRow, WriteResult};
use crate::db::{Database, DatabaseError};
use crate::error::StoreError;
use crate::job::{Job, JobId, JobRecord, NewJob, Status, DISPATCHABLE_STATUSES};
use crate::origin;

pub trait JobStore: Send + Sync {
    /// Persists a new job in `Incoming`.
    fn create(&self, job: &NewJob) -> Result<(), StoreError>;

    fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Current status, `Unknown` when the id is not stored.
    fn status(&self, id: JobId) -> Result<Status, StoreError>;

    /// Moves `from -> to` along a legal edge, only if the job is still in `from`.
    fn set_status(&self, id: JobId, from: Status, to: Status) -> Result<(), StoreError>;

    /// Records `message` and moves the job from `from` into `Error`.
    fn set_error(&self, id: JobId, from: Status, message: &str) -> Result<(), StoreError>;

    /// Stores guide data and moves the job `Prepped -> Annotated`.
    fn write_guide_data(&self, id: JobId, data: &str) -> Result<(), StoreError>;

    fn guide_data(&self, id: JobId) -> Result<Option<String>, StoreError>;

    /// True only when `address` matches the origin recorded at ingestion.
    /// Missing jobs and lookup failures answer `false`.
    fn matches_origin(&self, id: JobId, address: &str) -> bool;

    /// Jobs in a worker-dispatchable status, oldest first.
    fn pending(&self) -> Result<Vec<Job>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn check(
        &self,
        id: JobId,
        expected: Status,
        result: WriteResult,
    ) -> Result<(), StoreError> {
        match result {
            WriteResult::Applied => Ok(()),
            WriteResult::Missing => {
                log::warn!("{} not found when writing status", id);
                Err(StoreError::NotFound(id))
            }
            WriteResult::Conflict(actual) => Err(StoreError::StatusConflict {
                id,
                expected,
                actual: parse_status(&actual, id)?,
            }),
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn parse_status(name: &str, id: JobId) -> Result<Status, StoreError> {
    name.parse::<Status>().map_err(|e| {
        StoreError::Database(DatabaseError::CorruptRow {
            id: id.to_string(),
            reason: e.to_string(),
        })
    })
}

fn record_from_row(row: JobRow) -> Result<JobRecord, StoreError> {
    let id = JobId::parse(&row.id).map_err(|e| {
        StoreError::Database(DatabaseError::CorruptRow {
            id: row.id.clone(),
            reason: e.to_string(),
        })
    })?;

    Ok(JobRecord {
        id,
        status: parse_status(&row.status, id)?,
        origin: row.origin,
        source_ext: row.source_ext,
        guide_data: row.guide_data,
        error: row.error,
    })
}

impl JobStore for SqliteJobStore {
    fn create(&self, job: &NewJob) -> Result<(), StoreError> {
        if !job.has_valid_extension() {
            return Err(StoreError::InvalidSourceExt(job.source_ext.clone()));
        }

        let now = now();
        let row = JobRow {
            id: job.id.to_string(),
            status: Status::Incoming.as_str().to_string(),
            origin: origin::normalize(&job.origin),
            source_ext: job.source_ext.clone(),
            guide_data: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        };

        job_repo::insert(&self.db, &row)?;
        log::debug!("Created job {} from {}", job.id, row.origin);
        Ok(())
    }

    fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        job_repo::find_by_id(&self.db, &id.to_string())?
            .map(record_from_row)
            .transpose()
    }

    fn status(&self, id: JobId) -> Result<Status, StoreError> {
        match job_repo::status_of(&self.db, &id.to_string())? {
            Some(name) => parse_status(&name, id),
            None => Ok(Status::Unknown),
        }
    }

    fn set_status(&self, id: JobId, from: Status, to: Status) -> Result<(), StoreError> {
        from.validate_status_write(to)?;
        let result =
            job_repo::compare_and_set_status(&self.db, &id.to_string(), from.as_str(), to.as_str(), &now())?;
        self.check(id, from, result)
    }

    fn set_error(&self, id: JobId, from: Status, message: &str) -> Result<(), StoreError> {
        from.validate_transition(Status::Error)?;
        let result =
            job_repo::record_error(&self.db, &id.to_string(), from.as_str(), message, &now())?;
        self.check(id, from, result)
    }

    fn write_guide_data(&self, id: JobId, data: &str) -> Result<(), StoreError> {
        let result = job_repo::record_guide_data(&self.db, &id.to_string(), data, &now())?;
        if result == WriteResult::Missing {
            log::warn!("{} not found when setting guide data", id);
        }
        self.check(id, Status::Prepped, result)
    }

    fn guide_data(&self, id: JobId) -> Result<Option<String>, StoreError> {
        match self.find(id)? {
            Some(record) => Ok(record.guide_data),
            None => Err(StoreError::NotFound(id)),
        }
    }

    fn matches_origin(&self, id: JobId, address: &str) -> bool {
        let address = origin::normalize(address);
        if address.is_empty() {
            log::warn!("cannot do origin check on blank address: {}", id);
            return false;
        }

        match job_repo::origin_of(&self.db, &id.to_string()) {
            Ok(Some(recorded)) => recorded == address,
            Ok(None) => false,
            Err(e) => {
                log::error!("error reading origin for {}: {}", id, e);
                false
            }
        }
    }

    fn pending(&self) -> Result<Vec<Job>, StoreError> {
        let names: Vec<&str> = DISPATCHABLE_STATUSES.iter().map(|s| s.as_str()).collect();
        job_repo::list_by_status(&self.db, &names)?
            .into_iter()
            .map(|(raw_id, status)| {
                let id = JobId::parse(&raw_id).map_err(|e| {
                    StoreError::Database(DatabaseError::CorruptRow {
                        id: raw_id.clone(),
                        reason: e.to_string(),
                    })
                })?;
                Ok(Job::new(id, parse_status(&status, id)?))
            })
            .collect()
    }
}

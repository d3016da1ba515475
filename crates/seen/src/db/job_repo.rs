//! Job repository: row-level operations on the `jobs` table.
//!
//! Statuses are addressed by name through the `status` lookup table; no
//! integer status id leaves this module. Every mutating function is a
//! guarded UPDATE that runs under the connection lock, and a write that
//! matched no row reports why via [`WriteResult`].

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};

const SELECT_JOB: &str = "SELECT j.id, s.name AS status, j.origin, j.source_ext, j.guide_data,
            j.error, j.created_at, j.updated_at, j.completed_at
     FROM jobs j INNER JOIN status s ON s.id = j.status_id";

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub status: String,
    pub origin: String,
    pub source_ext: String,
    pub guide_data: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            origin: row.get("origin")?,
            source_ext: row.get("source_ext")?,
            guide_data: row.get("guide_data")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Result of a guarded write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Applied,
    /// No row with that id.
    Missing,
    /// The row exists but its status (carried here) did not match the guard.
    Conflict(String),
}

fn explain_miss(conn: &Connection, id: &str) -> Result<WriteResult, DatabaseError> {
    let status: Option<String> = conn
        .query_row(
            "SELECT s.name FROM jobs j INNER JOIN status s ON s.id = j.status_id WHERE j.id = ?1",
            params![id],
            |r| r.get(0),
        )
        .optional()?;

    Ok(match status {
        Some(status) => WriteResult::Conflict(status),
        None => WriteResult::Missing,
    })
}

fn write_result(conn: &Connection, id: &str, affected: usize) -> Result<WriteResult, DatabaseError> {
    if affected == 1 {
        Ok(WriteResult::Applied)
    } else {
        explain_miss(conn, id)
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, status_id, origin, source_ext, guide_data, error,
             created_at, updated_at, completed_at)
             VALUES (?1, (SELECT id FROM status WHERE name = ?2), ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.status,
                job.origin,
                job.source_ext,
                job.guide_data,
                job.error,
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!("{} WHERE j.id = ?1", SELECT_JOB);
        let row = conn
            .query_row(&sql, params![id], JobRow::from_row)
            .optional()?;
        Ok(row)
    })
}

/// Returns the status name of a job, or `None` if it does not exist.
pub fn status_of(db: &Database, id: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let status = conn
            .query_row(
                "SELECT s.name FROM jobs j INNER JOIN status s ON s.id = j.status_id
                 WHERE j.id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(status)
    })
}

/// Moves a job from `expected` to `next`. Stamps `completed_at` when the
/// new status is `complete`.
pub fn compare_and_set_status(
    db: &Database,
    id: &str,
    expected: &str,
    next: &str,
    now: &str,
) -> Result<WriteResult, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs
             SET status_id = (SELECT id FROM status WHERE name = ?3),
                 updated_at = ?4,
                 completed_at = CASE WHEN ?3 = 'complete' THEN ?4 ELSE completed_at END
             WHERE id = ?1 AND status_id = (SELECT id FROM status WHERE name = ?2)",
            params![id, expected, next, now],
        )?;
        write_result(conn, id, affected)
    })
}

/// Records a failure message and moves the job from `expected` to `error`.
/// An error message, once written, is never replaced.
pub fn record_error(
    db: &Database,
    id: &str,
    expected: &str,
    message: &str,
    now: &str,
) -> Result<WriteResult, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs
             SET error = ?3,
                 status_id = (SELECT id FROM status WHERE name = 'error'),
                 updated_at = ?4
             WHERE id = ?1
               AND error IS NULL
               AND status_id = (SELECT id FROM status WHERE name = ?2)",
            params![id, expected, message, now],
        )?;
        write_result(conn, id, affected)
    })
}

/// Stores guide data and moves the job from `prepped` to `annotated` in
/// one statement.
pub fn record_guide_data(
    db: &Database,
    id: &str,
    guide_data: &str,
    now: &str,
) -> Result<WriteResult, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE jobs
             SET guide_data = ?2,
                 status_id = (SELECT id FROM status WHERE name = 'annotated'),
                 updated_at = ?3
             WHERE id = ?1 AND status_id = (SELECT id FROM status WHERE name = 'prepped')",
            params![id, guide_data, now],
        )?;
        write_result(conn, id, affected)
    })
}

/// Returns the recorded origin of a job.
pub fn origin_of(db: &Database, id: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let origin = conn
            .query_row(
                "SELECT origin FROM jobs WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(origin)
    })
}

/// Lists `(id, status)` pairs for jobs in any of the given statuses,
/// oldest first.
pub fn list_by_status(
    db: &Database,
    statuses: &[&str],
) -> Result<Vec<(String, String)>, DatabaseError> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }

    db.with_conn(|conn| {
        let placeholders: Vec<String> = (1..=statuses.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT j.id, s.name FROM jobs j INNER JOIN status s ON s.id = j.status_id
             WHERE s.name IN ({}) ORDER BY j.created_at ASC",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(statuses.iter()), |r| {
                Ok((r.get(0)?, r.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2026-01-01T00:00:00+00:00";
    const LATER: &str = "2026-01-01T01:00:00+00:00";

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(id: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            status: "incoming".to_string(),
            origin: "10.0.0.1".to_string(),
            source_ext: "mp4".to_string(),
            guide_data: None,
            error: None,
            created_at: NOW.to_string(),
            updated_at: NOW.to_string(),
            completed_at: None,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_job("job-1")).unwrap();

        let found = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(found, sample_job("job-1"));
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nonexistent").unwrap().is_none());
        assert!(status_of(&db, "nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let db = test_db();
        insert(&db, &sample_job("dup")).unwrap();
        assert!(insert(&db, &sample_job("dup")).is_err());
    }

    #[test]
    fn test_compare_and_set_applies() {
        let db = test_db();
        insert(&db, &sample_job("cas")).unwrap();

        let result = compare_and_set_status(&db, "cas", "incoming", "normalised", LATER).unwrap();
        assert_eq!(result, WriteResult::Applied);

        let found = find_by_id(&db, "cas").unwrap().unwrap();
        assert_eq!(found.status, "normalised");
        assert_eq!(found.updated_at, LATER);
        assert!(found.completed_at.is_none());
    }

    #[test]
    fn test_compare_and_set_conflict_reports_actual_status() {
        let db = test_db();
        insert(&db, &sample_job("stale")).unwrap();
        compare_and_set_status(&db, "stale", "incoming", "normalised", LATER).unwrap();

        let result = compare_and_set_status(&db, "stale", "incoming", "normalised", LATER).unwrap();
        assert_eq!(result, WriteResult::Conflict("normalised".to_string()));
    }

    #[test]
    fn test_compare_and_set_missing() {
        let db = test_db();
        let result = compare_and_set_status(&db, "ghost", "incoming", "normalised", NOW).unwrap();
        assert_eq!(result, WriteResult::Missing);
    }

    #[test]
    fn test_complete_stamps_completed_at() {
        let db = test_db();
        let mut job = sample_job("done");
        job.status = "annotated".to_string();
        insert(&db, &job).unwrap();

        compare_and_set_status(&db, "done", "annotated", "complete", LATER).unwrap();
        let found = find_by_id(&db, "done").unwrap().unwrap();
        assert_eq!(found.completed_at.as_deref(), Some(LATER));
    }

    #[test]
    fn test_record_error_sets_status_and_message() {
        let db = test_db();
        insert(&db, &sample_job("err")).unwrap();

        let result = record_error(&db, "err", "incoming", "ffmpeg: invalid data", LATER).unwrap();
        assert_eq!(result, WriteResult::Applied);

        let found = find_by_id(&db, "err").unwrap().unwrap();
        assert_eq!(found.status, "error");
        assert_eq!(found.error.as_deref(), Some("ffmpeg: invalid data"));
    }

    #[test]
    fn test_record_error_never_overwrites() {
        let db = test_db();
        insert(&db, &sample_job("err2")).unwrap();
        record_error(&db, "err2", "incoming", "first", LATER).unwrap();

        let result = record_error(&db, "err2", "error", "second", LATER).unwrap();
        assert_eq!(result, WriteResult::Conflict("error".to_string()));

        let found = find_by_id(&db, "err2").unwrap().unwrap();
        assert_eq!(found.error.as_deref(), Some("first"));
    }

    #[test]
    fn test_record_guide_data_requires_prepped() {
        let db = test_db();
        insert(&db, &sample_job("g1")).unwrap();

        let result = record_guide_data(&db, "g1", r#"{"boxes":[]}"#, LATER).unwrap();
        assert_eq!(result, WriteResult::Conflict("incoming".to_string()));
        assert!(find_by_id(&db, "g1").unwrap().unwrap().guide_data.is_none());

        compare_and_set_status(&db, "g1", "incoming", "normalised", LATER).unwrap();
        compare_and_set_status(&db, "g1", "normalised", "prepped", LATER).unwrap();

        let result = record_guide_data(&db, "g1", r#"{"boxes":[]}"#, LATER).unwrap();
        assert_eq!(result, WriteResult::Applied);

        let found = find_by_id(&db, "g1").unwrap().unwrap();
        assert_eq!(found.status, "annotated");
        assert_eq!(found.guide_data.as_deref(), Some(r#"{"boxes":[]}"#));
    }

    #[test]
    fn test_record_guide_data_missing_job() {
        let db = test_db();
        let result = record_guide_data(&db, "nobody", "{}", NOW).unwrap();
        assert_eq!(result, WriteResult::Missing);
    }

    #[test]
    fn test_origin_of() {
        let db = test_db();
        insert(&db, &sample_job("o1")).unwrap();
        assert_eq!(origin_of(&db, "o1").unwrap().as_deref(), Some("10.0.0.1"));
        assert!(origin_of(&db, "o2").unwrap().is_none());
    }

    #[test]
    fn test_list_by_status_oldest_first() {
        let db = test_db();
        for (i, status) in ["incoming", "prepped", "annotated", "complete"]
            .iter()
            .enumerate()
        {
            let mut job = sample_job(&format!("l{}", i));
            job.status = status.to_string();
            job.created_at = format!("2026-01-0{}T00:00:00+00:00", 4 - i);
            insert(&db, &job).unwrap();
        }

        let rows = list_by_status(&db, &["incoming", "annotated"]).unwrap();
        assert_eq!(
            rows,
            vec![
                ("l2".to_string(), "annotated".to_string()),
                ("l0".to_string(), "incoming".to_string()),
            ]
        );
        assert!(list_by_status(&db, &[]).unwrap().is_empty());
    }
}

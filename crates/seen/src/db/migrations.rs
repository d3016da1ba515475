//! Schema versioning.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration
//! runs in its own transaction together with its record, so a failure
//! leaves the schema at the last good version.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_status_table",
        sql: include_str!("sql/001_create_status.sql"),
    },
    Migration {
        version: 2,
        name: "create_jobs_table",
        sql: include_str!("sql/002_create_jobs.sql"),
    },
];

/// Highest version recorded, 0 for a fresh database.
fn applied_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

/// Brings the schema up to the newest version.
pub fn run_all(conn: &mut Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = applied_version(conn)?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > current);

    for migration in pending {
        log::info!("Applying schema v{} ({})", migration.version, migration.name);

        let failed = |e: rusqlite::Error| DatabaseError::Migration {
            version: migration.version,
            reason: e.to_string(),
        };
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit().map_err(failed)?;
    }

    Ok(())
}

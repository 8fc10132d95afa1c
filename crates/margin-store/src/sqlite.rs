//! SQLite-backed tracking store

use crate::{Result, StoreError};
use margin_domain::{DecrementOutcome, JobTrackingRecord, TrackingStore};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS job_tracking (
    job_id     TEXT PRIMARY KEY,
    pages_sent INTEGER NOT NULL CHECK (pages_sent >= 0),
    date_sent  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS reviewed_pages (
    job_id   TEXT NOT NULL,
    page_key TEXT NOT NULL,
    PRIMARY KEY (job_id, page_key)
);
";

/// How long a writer waits for another connection's lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// SQLite implementation of [`TrackingStore`]
///
/// Several processes (or several instances in one process) may open the same
/// database file. A decrement records the reviewed page and updates the
/// counter inside one immediate transaction, so SQLite's write lock is what
/// serializes concurrent callers and a redelivered page is counted once.
pub struct SqliteTrackingStore {
    conn: Mutex<Connection>,
}

impl SqliteTrackingStore {
    /// Open (or create) a tracking database
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        if !journal_mode_ok(&mode) {
            debug!(journal_mode = %mode, "WAL journal mode not available");
        }
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Journal mode the connection ended up in
    pub fn journal_mode(&self) -> Result<String> {
        Ok(self
            .conn()?
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::InvalidData("tracking connection poisoned".to_string()))
    }

    /// All tracking records, oldest first
    pub fn list(&self) -> Result<Vec<JobTrackingRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT job_id, pages_sent, date_sent FROM job_tracking ORDER BY date_sent, job_id",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobTrackingRecord> {
    Ok(JobTrackingRecord {
        job_id: row.get(0)?,
        pages_sent: row.get(1)?,
        date_sent: row.get::<_, i64>(2)? as u64,
    })
}

impl TrackingStore for SqliteTrackingStore {
    type Error = StoreError;

    fn create(&self, record: &JobTrackingRecord) -> Result<()> {
        let inserted = self.conn()?.execute(
            "INSERT INTO job_tracking (job_id, pages_sent, date_sent) VALUES (?1, ?2, ?3)",
            params![&record.job_id, record.pages_sent, record.date_sent as i64],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate(record.job_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, job_id: &str) -> Result<Option<JobTrackingRecord>> {
        let record = self
            .conn()?
            .query_row(
                "SELECT job_id, pages_sent, date_sent FROM job_tracking WHERE job_id = ?1",
                params![job_id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn decrement(&self, job_id: &str, page_key: &str) -> Result<DecrementOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let tracked = tx
            .query_row(
                "SELECT 1 FROM job_tracking WHERE job_id = ?1",
                params![job_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !tracked {
            return Ok(DecrementOutcome::NotTracked);
        }

        let first_sighting = tx.execute(
            "INSERT OR IGNORE INTO reviewed_pages (job_id, page_key) VALUES (?1, ?2)",
            params![job_id, page_key],
        )? == 1;

        let outcome = if !first_sighting {
            DecrementOutcome::AlreadyCounted
        } else {
            let remaining: Option<u32> = tx
                .query_row(
                    "UPDATE job_tracking SET pages_sent = pages_sent - 1
                     WHERE job_id = ?1 AND pages_sent > 0
                     RETURNING pages_sent",
                    params![job_id],
                    |row| row.get(0),
                )
                .optional()?;
            match remaining {
                Some(remaining) => DecrementOutcome::Remaining(remaining),
                None => DecrementOutcome::AlreadyComplete,
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}

/// In-memory databases report "memory" and cannot use WAL
fn journal_mode_ok(mode: &str) -> bool {
    mode.eq_ignore_ascii_case("wal") || mode.eq_ignore_ascii_case("memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let store = SqliteTrackingStore::new(":memory:").unwrap();
        let record = JobTrackingRecord {
            job_id: "job-1".to_string(),
            pages_sent: 3,
            date_sent: 1_700_000_000,
        };
        store.create(&record).unwrap();
        assert_eq!(store.get("job-1").unwrap(), Some(record));
        assert_eq!(store.get("job-2").unwrap(), None);
    }

    #[test]
    fn test_journal_mode() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SqliteTrackingStore::new(dir.path().join("tracking.db")).unwrap();
        assert_eq!(store.journal_mode().unwrap(), "wal");

        let store = SqliteTrackingStore::new(":memory:").unwrap();
        assert_eq!(store.journal_mode().unwrap(), "memory");

        assert!(journal_mode_ok("WAL"));
        assert!(!journal_mode_ok("delete"));
        assert!(!journal_mode_ok("truncate"));
    }

    #[test]
    fn test_create_never_overwrites() {
        let store = SqliteTrackingStore::new(":memory:").unwrap();
        store.create(&JobTrackingRecord::new("job-1", 3)).unwrap();
        store.decrement("job-1", "page-1").unwrap();

        let err = store.create(&JobTrackingRecord::new("job-1", 5)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ref id) if id == "job-1"));
        assert_eq!(store.get("job-1").unwrap().unwrap().pages_sent, 2);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_decrement_sequence() {
        let store = SqliteTrackingStore::new(":memory:").unwrap();
        store.create(&JobTrackingRecord::new("job-1", 2)).unwrap();

        assert_eq!(store.decrement("job-1", "p1").unwrap(), DecrementOutcome::Remaining(1));
        assert_eq!(store.decrement("job-1", "p2").unwrap(), DecrementOutcome::Remaining(0));
        assert_eq!(store.decrement("job-1", "p3").unwrap(), DecrementOutcome::AlreadyComplete);
        assert_eq!(store.get("job-1").unwrap().unwrap().pages_sent, 0);
    }

    #[test]
    fn test_repeated_page_is_counted_once() {
        let store = SqliteTrackingStore::new(":memory:").unwrap();
        store.create(&JobTrackingRecord::new("job-1", 2)).unwrap();

        assert_eq!(store.decrement("job-1", "p1").unwrap(), DecrementOutcome::Remaining(1));
        assert_eq!(store.decrement("job-1", "p1").unwrap(), DecrementOutcome::AlreadyCounted);
        assert_eq!(store.get("job-1").unwrap().unwrap().pages_sent, 1);

        assert_eq!(store.decrement("job-1", "p2").unwrap(), DecrementOutcome::Remaining(0));
        assert_eq!(store.decrement("job-1", "p2").unwrap(), DecrementOutcome::AlreadyCounted);
    }

    #[test]
    fn test_page_keys_are_scoped_to_the_job() {
        let store = SqliteTrackingStore::new(":memory:").unwrap();
        store.create(&JobTrackingRecord::new("job-1", 1)).unwrap();
        store.create(&JobTrackingRecord::new("job-2", 1)).unwrap();

        assert!(store.decrement("job-1", "p1").unwrap().completed_job());
        assert!(store.decrement("job-2", "p1").unwrap().completed_job());
    }

    #[test]
    fn test_decrement_untracked_job() {
        let store = SqliteTrackingStore::new(":memory:").unwrap();
        assert_eq!(store.decrement("missing", "p1").unwrap(), DecrementOutcome::NotTracked);
    }
}

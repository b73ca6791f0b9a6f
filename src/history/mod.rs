//! # Run History
//!
//! Keeps every completed run in a SQLite database: one row per run and one
//! per case, so that results can be compared across runs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::report::{ReportError, ReportSink};
use crate::storage;
use crate::testing::{CaseOutcome, RunSummary};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to create history directory for `{}`: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open history database `{}`: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("history database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode case outcome: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One stored run, newest first when listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
    pub skipped: i64,
    pub duration_ms: i64,
}

/// One stored case outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseRecord {
    pub case_id: String,
    pub fixture: String,
    pub status: String,
    pub reason: Option<String>,
    pub detail: Option<String>,
    pub duration_ms: i64,
}

/// A stored run together with its cases, as listed by `--recent-runs`.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRun {
    #[serde(flatten)]
    pub run: RunRecord,
    pub cases: Vec<CaseRecord>,
}

pub struct RunHistory {
    conn: Connection,
}

impl RunHistory {
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        storage::ensure_parent_dir(path).map_err(|source| HistoryError::Directory {
            path: path.to_path_buf(),
            source,
        })?;
        let conn = Connection::open(path).map_err(|source| HistoryError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, HistoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
               id INTEGER PRIMARY KEY AUTOINCREMENT,
               started_at INTEGER NOT NULL,
               finished_at INTEGER NOT NULL,
               total INTEGER NOT NULL,
               passed INTEGER NOT NULL,
               failed INTEGER NOT NULL,
               skipped INTEGER NOT NULL,
               duration_ms INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS case_results (
               run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
               position INTEGER NOT NULL,
               case_id TEXT NOT NULL,
               fixture TEXT NOT NULL,
               status TEXT NOT NULL,
               reason TEXT,
               detail TEXT,
               duration_ms INTEGER NOT NULL,
               outcome_json TEXT NOT NULL,
               PRIMARY KEY (run_id, position)
             );",
        )?;
        Ok(Self { conn })
    }

    /// Store a finished run and its cases; returns the new run id.
    pub fn record_run(&mut self, summary: &RunSummary) -> Result<i64, HistoryError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO runs (started_at, finished_at, total, passed, failed, skipped, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                summary.started_at.timestamp(),
                summary.finished_at.timestamp(),
                to_i64(summary.total as u64),
                to_i64(summary.passed as u64),
                to_i64(summary.failed as u64),
                to_i64(summary.skipped as u64),
                to_i64(summary.duration_ms),
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut insert = tx.prepare(
                "INSERT INTO case_results
                   (run_id, position, case_id, fixture, status, reason, detail, duration_ms, outcome_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            )?;
            for (position, result) in summary.results.iter().enumerate() {
                insert.execute(params![
                    run_id,
                    to_i64(position as u64),
                    result.case_id,
                    result.fixture.display().to_string(),
                    result.outcome.label(),
                    result.outcome.reason(),
                    result.outcome.detail(),
                    to_i64(result.duration_ms),
                    serde_json::to_string(result)?,
                ])?;
            }
        }

        tx.commit()?;
        Ok(run_id)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, HistoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, total, passed, failed, skipped, duration_ms
             FROM runs ORDER BY id DESC LIMIT ?1;",
        )?;
        let rows = stmt.query_map(params![to_i64(limit as u64)], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                started_at: from_unix(row.get(1)?),
                finished_at: from_unix(row.get(2)?),
                total: row.get(3)?,
                passed: row.get(4)?,
                failed: row.get(5)?,
                skipped: row.get(6)?,
                duration_ms: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn case_results(&self, run_id: i64) -> Result<Vec<CaseRecord>, HistoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT case_id, fixture, status, reason, detail, duration_ms
             FROM case_results WHERE run_id = ?1 ORDER BY position;",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(CaseRecord {
                case_id: row.get(0)?,
                fixture: row.get(1)?,
                status: row.get(2)?,
                reason: row.get(3)?,
                detail: row.get(4)?,
                duration_ms: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The `limit` newest runs, each with its cases in discovery order.
    pub fn recent_runs_with_cases(&self, limit: usize) -> Result<Vec<StoredRun>, HistoryError> {
        self.recent_runs(limit)?
            .into_iter()
            .map(|run| -> Result<StoredRun, HistoryError> {
                let cases = self.case_results(run.id)?;
                Ok(StoredRun { run, cases })
            })
            .collect()
    }
}

impl ReportSink for RunHistory {
    fn record(&mut self, _outcome: &CaseOutcome) {}

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        let run_id = self.record_run(summary)?;
        info!(run_id, cases = summary.total, "run stored in history");
        Ok(())
    }
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

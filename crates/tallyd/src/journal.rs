//! SQLite recognition journal.
//!
//! Client-side record of what each scan run recognized, for review after
//! the session closes. Writes are best-effort: callers log journal errors
//! and never fail a capture cycle on one.

use std::path::Path;
use tally_core::RecognizedStudent;
use thiserror::Error;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id         TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    started_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS recognitions (
    run_id        TEXT NOT NULL REFERENCES runs(id),
    student_id    TEXT NOT NULL,
    score         REAL NOT NULL,
    recognized_at TEXT NOT NULL,
    UNIQUE (run_id, student_id)
);
";

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("journal directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
}

pub struct Journal {
    conn: Connection,
}

impl Journal {
    /// Open (or create) the journal database at the given path.
    pub async fn open(path: &Path) -> Result<Self, JournalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    /// In-memory journal, for diagnostics and tests.
    pub async fn open_in_memory() -> Result<Self, JournalError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, JournalError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Record the start of a scan run (agent startup or post-reset).
    pub async fn begin_run(&self, run_id: &str, session_id: &str) -> Result<(), JournalError> {
        let run_id = run_id.to_string();
        let session_id = session_id.to_string();
        let started_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO runs (id, session_id, started_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![run_id, session_id, started_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Append newly recognized students for a run.
    ///
    /// INSERT OR IGNORE on (run_id, student_id) re-states the roster's
    /// first-write-wins invariant at the storage layer.
    pub async fn record_recognitions(
        &self,
        run_id: &str,
        entries: &[(String, RecognizedStudent)],
    ) -> Result<(), JournalError> {
        if entries.is_empty() {
            return Ok(());
        }
        let run_id = run_id.to_string();
        let rows: Vec<(String, f64, String)> = entries
            .iter()
            .map(|(id, r)| (id.clone(), r.score as f64, r.recognized_at.to_rfc3339()))
            .collect();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (student_id, score, recognized_at) in &rows {
                    tx.execute(
                        "INSERT OR IGNORE INTO recognitions \
                         (run_id, student_id, score, recognized_at) VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![run_id, student_id, score, recognized_at],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Number of distinct students recorded for a run.
    pub async fn recognition_count(&self, run_id: &str) -> Result<u64, JournalError> {
        let run_id = run_id.to_string();
        let count = self
            .conn
            .call(move |conn| {
                let count: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM recognitions WHERE run_id = ?1",
                    rusqlite::params![run_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn student(score: f32) -> RecognizedStudent {
        RecognizedStudent {
            score,
            face: "ref".to_string(),
            recognized_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_and_count() {
        let journal = Journal::open_in_memory().await.unwrap();
        journal.begin_run("run-1", "abc").await.unwrap();
        journal
            .record_recognitions(
                "run-1",
                &[
                    ("s1".to_string(), student(0.9)),
                    ("s2".to_string(), student(0.8)),
                ],
            )
            .await
            .unwrap();
        assert_eq!(journal.recognition_count("run-1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_student_ignored() {
        let journal = Journal::open_in_memory().await.unwrap();
        journal.begin_run("run-1", "abc").await.unwrap();
        journal
            .record_recognitions("run-1", &[("s1".to_string(), student(0.9))])
            .await
            .unwrap();
        // Same student again, different score — storage keeps the first row.
        journal
            .record_recognitions("run-1", &[("s1".to_string(), student(0.5))])
            .await
            .unwrap();
        assert_eq!(journal.recognition_count("run-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_runs_are_independent() {
        let journal = Journal::open_in_memory().await.unwrap();
        journal.begin_run("run-1", "abc").await.unwrap();
        journal.begin_run("run-2", "abc").await.unwrap();
        journal
            .record_recognitions("run-1", &[("s1".to_string(), student(0.9))])
            .await
            .unwrap();
        // Post-reset run starts from zero even for the same session.
        assert_eq!(journal.recognition_count("run-2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let journal = Journal::open_in_memory().await.unwrap();
        journal.begin_run("run-1", "abc").await.unwrap();
        journal.record_recognitions("run-1", &[]).await.unwrap();
        assert_eq!(journal.recognition_count("run-1").await.unwrap(), 0);
    }
}

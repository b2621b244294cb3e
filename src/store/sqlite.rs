//! SQLite persistence for applications.
//!
//! One connection guarded by a mutex serves the process; merges additionally run
//! inside `BEGIN IMMEDIATE` so concurrent worker processes sharing the file
//! cannot interleave a read-modify-write on the same applicant.

use crate::detection::LinkRecord;
use crate::error::StoreError;
use crate::fusion;
use crate::store::{ApplicationStore, MergeOutcome, StoreSummary};
use crate::types::{Application, ApplicationSubmission, Signal};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS applications (
    applicant_id        TEXT PRIMARY KEY,
    name                TEXT NOT NULL,
    stated_income       REAL NOT NULL,
    financial_account   TEXT NOT NULL DEFAULT '',
    asset_registration  TEXT NOT NULL DEFAULT '',
    fraud_score         INTEGER NOT NULL DEFAULT 0,
    justification       TEXT NOT NULL DEFAULT '[]',
    updated_at          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_applications_financial_account
    ON applications (financial_account);
CREATE TABLE IF NOT EXISTS applied_jobs (
    applicant_id  TEXT NOT NULL,
    job_id        TEXT NOT NULL,
    applied_at    TEXT NOT NULL,
    PRIMARY KEY (applicant_id, job_id)
);
CREATE INDEX IF NOT EXISTS idx_applied_jobs_applied_at
    ON applied_jobs (applied_at);
"#;

const SELECT_APPLICATION: &str = "SELECT applicant_id, name, stated_income, financial_account, \
     asset_registration, fraud_score, justification, updated_at \
     FROM applications WHERE applicant_id = ?1";

/// [`ApplicationStore`] backed by a SQLite database file
pub struct SqliteApplicationStore {
    conn: Mutex<Connection>,
}

impl SqliteApplicationStore {
    /// Open (or create) the database file and apply the schema
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        // WAL keeps the ring scan from blocking writers in other processes.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::init_schema(&conn)?;

        info!(path = %path.display(), "Opened application store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(SCHEMA)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    let justification: String = row.get(6)?;
    let justification: Vec<String> = serde_json::from_str(&justification)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    let score: i64 = row.get(5)?;

    Ok(Application {
        applicant_id: row.get(0)?,
        name: row.get(1)?,
        stated_income: row.get(2)?,
        financial_account: row.get(3)?,
        asset_registration: row.get(4)?,
        fraud_score: score.clamp(0, 100) as u8,
        justification,
        updated_at: row.get(7)?,
    })
}

fn fetch(conn: &Connection, applicant_id: &str) -> rusqlite::Result<Option<Application>> {
    conn.query_row(SELECT_APPLICATION, params![applicant_id], application_from_row)
        .optional()
}

impl ApplicationStore for SqliteApplicationStore {
    fn get(&self, applicant_id: &str) -> Result<Option<Application>, StoreError> {
        let conn = self.lock()?;
        Ok(fetch(&conn, applicant_id)?)
    }

    fn upsert(&self, submission: ApplicationSubmission) -> Result<Application, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO applications \
                 (applicant_id, name, stated_income, financial_account, asset_registration, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(applicant_id) DO UPDATE SET \
                 name = excluded.name, \
                 stated_income = excluded.stated_income, \
                 financial_account = excluded.financial_account, \
                 asset_registration = excluded.asset_registration, \
                 updated_at = excluded.updated_at",
            params![
                submission.applicant_id,
                submission.name,
                submission.stated_income,
                submission.financial_account,
                submission.asset_registration,
                Utc::now(),
            ],
        )?;

        let stored = fetch(&tx, &submission.applicant_id)?
            .ok_or_else(|| StoreError::NotFound(submission.applicant_id.clone()))?;
        tx.commit()?;
        Ok(stored)
    }

    fn merge_score(
        &self,
        applicant_id: &str,
        job_id: &str,
        signals: &[Signal],
    ) -> Result<MergeOutcome, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut record = fetch(&tx, applicant_id)?
            .ok_or_else(|| StoreError::NotFound(applicant_id.to_string()))?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO applied_jobs (applicant_id, job_id, applied_at) VALUES (?1, ?2, ?3)",
            params![applicant_id, job_id, Utc::now()],
        )?;
        if inserted == 0 {
            tx.commit()?;
            return Ok(MergeOutcome::AlreadyApplied(record));
        }

        let fused = fusion::fuse(record.fraud_score, &record.justification, signals);
        record.fraud_score = fused.score;
        record.justification = fused.justification;
        record.updated_at = Utc::now();

        tx.execute(
            "UPDATE applications SET fraud_score = ?1, justification = ?2, updated_at = ?3 \
             WHERE applicant_id = ?4",
            params![
                record.fraud_score,
                serde_json::to_string(&record.justification)?,
                record.updated_at,
                applicant_id,
            ],
        )?;
        tx.commit()?;

        Ok(MergeOutcome::Applied(record))
    }

    fn scan_link_records(&self) -> Result<Vec<LinkRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT applicant_id, financial_account, asset_registration FROM applications",
        )?;
        let records = stmt
            .query_map([], |row| {
                Ok(LinkRecord {
                    applicant_id: row.get(0)?,
                    financial_account: row.get(1)?,
                    asset_registration: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn summary(&self, flag_threshold: u8) -> Result<StoreSummary, StoreError> {
        let conn = self.lock()?;
        let (total, flagged): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), SUM(CASE WHEN fraud_score > ?1 THEN 1 ELSE 0 END) FROM applications",
            params![flag_threshold],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(StoreSummary::new(
            total.max(0) as u64,
            flagged.unwrap_or(0).max(0) as u64,
        ))
    }

    fn prune_applied_jobs(&self, applied_before: DateTime<Utc>) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM applied_jobs WHERE applied_at < ?1",
            params![applied_before],
        )?;
        Ok(removed)
    }
}

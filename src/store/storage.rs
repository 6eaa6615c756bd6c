use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use super::{now, timestamp, Submission, SyncCounts, SyncError};
use crate::error::Result;

const SUBMISSION_COLUMNS: &str = "id, created_at, email, name, phone, property_address, status, \
     urgency_level, missed_payments, received_nod, property_value, mortgage_balance, challenges, \
     difficulties, family_impact, financial_impact, preferred_solution, openness_to_options, \
     synced_to_hubspot, last_sync_error, sync_attempts, hubspot_contact_id, synced_at";

const SYNC_ERROR_COLUMNS: &str = "id, table_name, record_id, error_message, error_details, \
     created_at, resolved, resolved_at, resolved_by, retry_count, notes";

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS submissions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                email TEXT NOT NULL,
                name TEXT NOT NULL,
                phone TEXT,
                property_address TEXT,
                status TEXT,
                urgency_level TEXT,
                missed_payments INTEGER,
                received_nod INTEGER,
                property_value REAL,
                mortgage_balance REAL,
                challenges TEXT,
                difficulties TEXT,
                family_impact TEXT,
                financial_impact TEXT,
                preferred_solution TEXT,
                openness_to_options TEXT,
                synced_to_hubspot INTEGER NOT NULL DEFAULT 0,
                last_sync_error TEXT,
                sync_attempts INTEGER NOT NULL DEFAULT 0,
                hubspot_contact_id TEXT,
                synced_at TEXT,
                sync_lease_until TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_submissions_unsynced
                ON submissions (synced_to_hubspot, created_at);

            CREATE TABLE IF NOT EXISTS sync_errors (
                id TEXT PRIMARY KEY,
                table_name TEXT NOT NULL,
                record_id TEXT NOT NULL,
                error_message TEXT NOT NULL,
                error_details TEXT NOT NULL DEFAULT 'null',
                created_at TEXT NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0,
                resolved_at TEXT,
                resolved_by TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                notes TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sync_errors_unresolved
                ON sync_errors (resolved, created_at);
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ─── Submissions ─────────────────────────────────────────────────────────

    /// Stores a submission from intake, assigning an id and creation time when absent.
    pub fn insert_submission(&self, submission: &Submission) -> Result<Submission> {
        let mut stored = submission.clone();
        if stored.id.is_empty() {
            stored.id = uuid::Uuid::new_v4().to_string();
        }
        if stored.created_at.is_empty() {
            stored.created_at = now();
        }

        self.conn.lock().execute(
            &format!(
                "INSERT INTO submissions ({SUBMISSION_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, \
                  ?19, ?20, ?21, ?22, ?23)"
            ),
            params![
                stored.id,
                stored.created_at,
                stored.email,
                stored.name,
                stored.phone,
                stored.property_address,
                stored.status,
                stored.urgency_level,
                stored.missed_payments,
                stored.received_nod,
                stored.property_value,
                stored.mortgage_balance,
                stored.challenges,
                stored.difficulties,
                stored.family_impact,
                stored.financial_impact,
                stored.preferred_solution,
                stored.openness_to_options,
                stored.synced_to_hubspot,
                stored.last_sync_error,
                stored.sync_attempts,
                stored.hubspot_contact_id,
                stored.synced_at,
            ],
        )?;

        Ok(stored)
    }

    pub fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        let conn = self.conn.lock();
        let submission = conn
            .query_row(
                &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?1"),
                params![id],
                submission_from_row,
            )
            .optional()?;
        Ok(submission)
    }

    /// Unsynced submissions, fewest attempts first and oldest within that, so records that keep
    /// failing cannot starve newer ones.
    pub fn unsynced_candidates(&self, limit: u32) -> Result<Vec<String>> {
        self.select_ids(
            "SELECT id FROM submissions WHERE synced_to_hubspot = 0 \
             ORDER BY sync_attempts ASC, created_at ASC, rowid ASC LIMIT ?1",
            params![limit],
        )
    }

    pub fn retry_candidates(&self, max_retries: u32, limit: u32) -> Result<Vec<String>> {
        self.select_ids(
            "SELECT id FROM submissions WHERE synced_to_hubspot = 0 \
             AND last_sync_error IS NOT NULL AND sync_attempts < ?1 \
             ORDER BY created_at ASC, rowid ASC LIMIT ?2",
            params![max_retries, limit],
        )
    }

    fn select_ids(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map(params, |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn count_unsynced(&self) -> Result<u64> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM submissions WHERE synced_to_hubspot = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn sync_counts(&self) -> Result<SyncCounts> {
        let (total, synced, with_error): (i64, i64, i64) = self.conn.lock().query_row(
            "SELECT COUNT(*), COALESCE(SUM(synced_to_hubspot), 0), COUNT(last_sync_error) \
             FROM submissions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(SyncCounts {
            total: total as u64,
            synced: synced as u64,
            with_error: with_error as u64,
        })
    }

    /// Takes the per-record sync lease. Returns false while another run holds an unexpired lease.
    pub fn claim_for_sync(&self, id: &str, lease: Duration) -> Result<bool> {
        let at = Utc::now();
        let claimed = self.conn.lock().execute(
            "UPDATE submissions SET sync_lease_until = ?2 \
             WHERE id = ?1 AND (sync_lease_until IS NULL OR sync_lease_until < ?3)",
            params![id, timestamp(at + lease), timestamp(at)],
        )?;
        Ok(claimed == 1)
    }

    pub fn mark_synced(&self, id: &str, contact_id: &str) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE submissions SET synced_to_hubspot = 1, last_sync_error = NULL, \
             hubspot_contact_id = ?2, synced_at = ?3, sync_lease_until = NULL WHERE id = ?1",
            params![id, contact_id, now()],
        )?;
        Ok(())
    }

    /// Bumps the attempt counter and stores the error. Returns the new attempt count.
    pub fn record_failure(&self, id: &str, message: &str) -> Result<u32> {
        let attempts = self.conn.lock().query_row(
            "UPDATE submissions SET sync_attempts = sync_attempts + 1, last_sync_error = ?2, \
             sync_lease_until = NULL WHERE id = ?1 RETURNING sync_attempts",
            params![id, message],
            |row| row.get(0),
        )?;
        Ok(attempts)
    }

    // ─── Error ledger ────────────────────────────────────────────────────────

    pub fn insert_sync_error(
        &self,
        table_name: &str,
        record_id: &str,
        message: &str,
        details: &serde_json::Value,
        retry_count: u32,
    ) -> Result<SyncError> {
        let record = SyncError {
            id: uuid::Uuid::new_v4().to_string(),
            table_name: table_name.to_string(),
            record_id: record_id.to_string(),
            error_message: message.to_string(),
            error_details: details.clone(),
            created_at: now(),
            resolved: false,
            resolved_at: None,
            resolved_by: None,
            retry_count,
            notes: None,
        };

        self.conn.lock().execute(
            &format!(
                "INSERT INTO sync_errors ({SYNC_ERROR_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, NULL, ?7, NULL)"
            ),
            params![
                record.id,
                record.table_name,
                record.record_id,
                record.error_message,
                serde_json::to_string(&record.error_details)?,
                record.created_at,
                record.retry_count,
            ],
        )?;

        Ok(record)
    }

    pub fn get_sync_error(&self, id: &str) -> Result<Option<SyncError>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("SELECT {SYNC_ERROR_COLUMNS} FROM sync_errors WHERE id = ?1"),
                params![id],
                sync_error_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn errors_for_record(&self, record_id: &str) -> Result<Vec<SyncError>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYNC_ERROR_COLUMNS} FROM sync_errors WHERE record_id = ?1 \
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let records = stmt
            .query_map(params![record_id], sync_error_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn list_unresolved(&self, limit: u32) -> Result<Vec<SyncError>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYNC_ERROR_COLUMNS} FROM sync_errors WHERE resolved = 0 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        ))?;
        let records = stmt
            .query_map(params![limit], sync_error_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Marks a ledger row resolved. The first resolution time and resolver are kept on repeat
    /// calls; notes are replaced only when new ones are given. Returns false for unknown ids.
    pub fn resolve_error(
        &self,
        id: &str,
        resolved_by: Option<&str>,
        notes: Option<&str>,
    ) -> Result<bool> {
        let updated = self.conn.lock().execute(
            "UPDATE sync_errors SET resolved = 1, resolved_at = COALESCE(resolved_at, ?2), \
             resolved_by = COALESCE(resolved_by, ?3), notes = COALESCE(?4, notes) WHERE id = ?1",
            params![id, now(), resolved_by, notes],
        )?;
        Ok(updated == 1)
    }

    /// Deletes resolved rows whose resolution predates `cutoff`. Unresolved rows are kept.
    pub fn purge_resolved_before(&self, cutoff: chrono::DateTime<Utc>) -> Result<usize> {
        let purged = self.conn.lock().execute(
            "DELETE FROM sync_errors WHERE resolved = 1 AND resolved_at < ?1",
            params![timestamp(cutoff)],
        )?;
        Ok(purged)
    }
}

fn submission_from_row(row: &Row<'_>) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: row.get(0)?,
        created_at: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        phone: row.get(4)?,
        property_address: row.get(5)?,
        status: row.get(6)?,
        urgency_level: row.get(7)?,
        missed_payments: row.get(8)?,
        received_nod: row.get(9)?,
        property_value: row.get(10)?,
        mortgage_balance: row.get(11)?,
        challenges: row.get(12)?,
        difficulties: row.get(13)?,
        family_impact: row.get(14)?,
        financial_impact: row.get(15)?,
        preferred_solution: row.get(16)?,
        openness_to_options: row.get(17)?,
        synced_to_hubspot: row.get(18)?,
        last_sync_error: row.get(19)?,
        sync_attempts: row.get(20)?,
        hubspot_contact_id: row.get(21)?,
        synced_at: row.get(22)?,
    })
}

fn sync_error_from_row(row: &Row<'_>) -> rusqlite::Result<SyncError> {
    let details: String = row.get(4)?;
    Ok(SyncError {
        id: row.get(0)?,
        table_name: row.get(1)?,
        record_id: row.get(2)?,
        error_message: row.get(3)?,
        error_details: serde_json::from_str(&details).unwrap_or(serde_json::Value::Null),
        created_at: row.get(5)?,
        resolved: row.get(6)?,
        resolved_at: row.get(7)?,
        resolved_by: row.get(8)?,
        retry_count: row.get(9)?,
        notes: row.get(10)?,
    })
}

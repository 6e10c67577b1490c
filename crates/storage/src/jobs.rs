// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job row CRUD and status transitions.
//!
//! Transition methods enforce the forward-only state machine from
//! [`relay_core::JobStatus`] and maintain the timestamp invariants:
//! `started_at` is written exactly once at the running transition,
//! `completed_at` exactly once at any terminal transition, and `pid`
//! is cleared whenever the job leaves `running`.

use crate::error::StoreError;
use crate::store::Store;
use relay_core::{Job, JobStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};

fn job_from_row(row: &Row<'_>) -> Result<Job, rusqlite::Error> {
    let status_str: String = row.get("status")?;
    let status = JobStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(3, "status".into(), rusqlite::types::Type::Text)
    })?;
    Ok(Job {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        prompt: row.get("prompt")?,
        status,
        source: row.get("source")?,
        result: row.get("result")?,
        error: row.get("error")?,
        pid: row.get::<_, Option<i64>>("pid")?.map(|p| p as u32),
        created_at_ms: row.get::<_, i64>("created_at")? as u64,
        updated_at_ms: row.get::<_, i64>("updated_at")? as u64,
        started_at_ms: row.get::<_, Option<i64>>("started_at")?.map(|t| t as u64),
        completed_at_ms: row.get::<_, Option<i64>>("completed_at")?.map(|t| t as u64),
    })
}

fn job_row(conn: &Connection, id: &str) -> Result<Option<Job>, StoreError> {
    let job = conn
        .query_row("SELECT * FROM jobs WHERE id = ?1", [id], job_from_row)
        .optional()?;
    Ok(job)
}

fn status_of(conn: &Connection, id: &str) -> Result<JobStatus, StoreError> {
    let status_str: Option<String> = conn
        .query_row("SELECT status FROM jobs WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    let status_str = status_str.ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
    JobStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Corrupt(format!("job {id} has status {status_str}")))
}

fn check_transition(conn: &Connection, id: &str, to: JobStatus) -> Result<(), StoreError> {
    let from = status_of(conn, id)?;
    if !from.can_transition_to(to) {
        return Err(StoreError::BadTransition { from, to });
    }
    Ok(())
}

impl Store {
    /// Insert a new queued job.
    pub fn create_job(
        &self,
        conversation_id: &str,
        prompt: &str,
        source: &str,
    ) -> Result<Job, StoreError> {
        let id = relay_core::id::job_id();
        let now = self.now_ms() as i64;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO jobs (id, conversation_id, prompt, status, source, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![id, conversation_id, prompt, JobStatus::Queued.to_string(), source, now],
            )?;
            job_row(conn, &id)?.ok_or_else(|| StoreError::JobNotFound(id.clone()))
        })
    }

    pub fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        self.with_conn(|conn| job_row(conn, id))
    }

    /// List jobs, newest first, optionally filtered by status.
    pub fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>, StoreError> {
        self.with_conn(|conn| {
            let mut jobs = Vec::new();
            match status {
                Some(status) => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM jobs WHERE status = ?1 ORDER BY created_at DESC, id DESC",
                    )?;
                    let rows = stmt.query_map([status.to_string()], job_from_row)?;
                    for row in rows {
                        jobs.push(row?);
                    }
                }
                None => {
                    let mut stmt =
                        conn.prepare("SELECT * FROM jobs ORDER BY created_at DESC, id DESC")?;
                    let rows = stmt.query_map([], job_from_row)?;
                    for row in rows {
                        jobs.push(row?);
                    }
                }
            }
            Ok(jobs)
        })
    }

    /// queued → running. Records the subprocess pid and the start time.
    pub fn mark_running(&self, id: &str, pid: Option<u32>) -> Result<Job, StoreError> {
        let now = self.now_ms() as i64;
        self.with_conn(|conn| {
            check_transition(conn, id, JobStatus::Running)?;
            conn.execute(
                "UPDATE jobs SET status = 'running', pid = ?2, started_at = ?3, updated_at = ?3
                 WHERE id = ?1",
                params![id, pid.map(|p| p as i64), now],
            )?;
            job_row(conn, id)?.ok_or_else(|| StoreError::JobNotFound(id.to_string()))
        })
    }

    /// running → completed, with the accumulated result text.
    pub fn mark_completed(&self, id: &str, result: &str) -> Result<Job, StoreError> {
        self.finalize(id, JobStatus::Completed, Some(result), None)
    }

    /// running → failed, with the failure message.
    pub fn mark_failed(&self, id: &str, error: &str) -> Result<Job, StoreError> {
        self.finalize(id, JobStatus::Failed, None, Some(error))
    }

    /// queued|running → cancelled. Cancellation is not a failure: the
    /// job ends with neither result nor error.
    pub fn mark_cancelled(&self, id: &str) -> Result<Job, StoreError> {
        self.finalize(id, JobStatus::Cancelled, None, None)
    }

    fn finalize(
        &self,
        id: &str,
        to: JobStatus,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<Job, StoreError> {
        let now = self.now_ms() as i64;
        self.with_conn(|conn| {
            check_transition(conn, id, to)?;
            conn.execute(
                "UPDATE jobs SET status = ?2, result = ?3, error = ?4, pid = NULL,
                        completed_at = ?5, updated_at = ?5
                 WHERE id = ?1",
                params![id, to.to_string(), result, error, now],
            )?;
            job_row(conn, id)?.ok_or_else(|| StoreError::JobNotFound(id.to_string()))
        })
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;

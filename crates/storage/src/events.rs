// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only job event log.
//!
//! Rows are only ever inserted (and cascade-deleted with their job);
//! the monotonic rowid doubles as the subscriber sequence number, so
//! insert order is emission order and a reader can resume from any
//! last-seen sequence.

use crate::error::StoreError;
use crate::store::Store;
use relay_core::{JobEventKind, JobEventPayload};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

/// One persisted job event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Monotonic per-store sequence (SQLite rowid).
    pub seq: i64,
    pub job_id: String,
    #[serde(rename = "type")]
    pub kind: JobEventKind,
    pub data: serde_json::Value,
    pub timestamp_ms: u64,
}

impl StoredEvent {
    /// Decode the payload body. `None` when the stored data does not
    /// match the kind's shape.
    pub fn payload(&self) -> Option<JobEventPayload> {
        JobEventPayload::from_parts(self.kind, &self.data)
    }
}

fn event_from_row(row: &Row<'_>) -> Result<StoredEvent, rusqlite::Error> {
    let kind_str: String = row.get("event_type")?;
    let kind = JobEventKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, "event_type".into(), rusqlite::types::Type::Text)
    })?;
    let data_str: String = row.get("data")?;
    let data = serde_json::from_str(&data_str).unwrap_or(serde_json::Value::Null);
    Ok(StoredEvent {
        seq: row.get("id")?,
        job_id: row.get("job_id")?,
        kind,
        data,
        timestamp_ms: row.get::<_, i64>("timestamp")? as u64,
    })
}

impl Store {
    /// Append one event to a job's log and return the stored row.
    pub fn append_event(
        &self,
        job_id: &str,
        payload: &JobEventPayload,
    ) -> Result<StoredEvent, StoreError> {
        let now = self.now_ms() as i64;
        let kind = payload.kind();
        let data = payload.data().to_string();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO job_events (job_id, event_type, data, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![job_id, kind.to_string(), data, now],
            )?;
            let seq = conn.last_insert_rowid();
            Ok(StoredEvent {
                seq,
                job_id: job_id.to_string(),
                kind,
                data: payload.data(),
                timestamp_ms: now as u64,
            })
        })
    }

    /// All events for `job_id` with sequence greater than `after_seq`,
    /// in emission order. Pass 0 to read the full log.
    pub fn events_after(
        &self,
        job_id: &str,
        after_seq: i64,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, job_id, event_type, data, timestamp FROM job_events
                 WHERE job_id = ?1 AND id > ?2 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![job_id, after_seq], event_from_row)?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;

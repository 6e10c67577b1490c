// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned schema migrations.
//!
//! A single-row `schema_version` table tracks the highest applied
//! migration number. At open, every migration above the current
//! version is applied in ascending order, each inside its own
//! transaction together with the version bump. Evolution is strictly
//! additive: a new migration never alters the semantics of an applied
//! one.

use crate::error::StoreError;
use rusqlite::Connection;

struct Migration {
    version: u32,
    sql: &'static str,
}

/// Migration 1: conversation/message persistence and the full-text
/// index over message content, kept in sync by triggers.
const MIGRATION_1: &str = "
CREATE TABLE conversations (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL DEFAULT '',
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE TABLE messages (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    role             TEXT NOT NULL,
    content          TEXT NOT NULL,
    created_at       INTEGER NOT NULL
);
CREATE INDEX idx_messages_conversation ON messages(conversation_id);

CREATE TABLE message_images (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id  INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    path        TEXT NOT NULL
);

CREATE TABLE activities (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    data             TEXT NOT NULL,
    created_at       INTEGER NOT NULL
);

CREATE VIRTUAL TABLE messages_fts USING fts5(
    content,
    content='messages',
    content_rowid='id'
);

CREATE TRIGGER messages_fts_insert AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, content) VALUES (new.id, new.content);
END;

CREATE TRIGGER messages_fts_delete AFTER DELETE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content)
    VALUES ('delete', old.id, old.content);
END;

CREATE TRIGGER messages_fts_update AFTER UPDATE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content)
    VALUES ('delete', old.id, old.content);
    INSERT INTO messages_fts(rowid, content) VALUES (new.id, new.content);
END;
";

/// Migration 2: jobs and their append-only event logs. Deleting a
/// conversation cascades through jobs to job_events.
const MIGRATION_2: &str = "
CREATE TABLE jobs (
    id               TEXT PRIMARY KEY,
    conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    prompt           TEXT NOT NULL,
    status           TEXT NOT NULL,
    source           TEXT NOT NULL,
    result           TEXT,
    error            TEXT,
    pid              INTEGER,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL,
    started_at       INTEGER,
    completed_at     INTEGER
);
CREATE INDEX idx_jobs_status ON jobs(status);
CREATE INDEX idx_jobs_conversation ON jobs(conversation_id);

CREATE TABLE job_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id      TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    event_type  TEXT NOT NULL,
    data        TEXT NOT NULL,
    timestamp   INTEGER NOT NULL
);
CREATE INDEX idx_job_events_job_time ON job_events(job_id, timestamp);
";

const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, sql: MIGRATION_1 },
    Migration { version: 2, sql: MIGRATION_2 },
];

/// Apply all pending migrations.
pub(crate) fn run(conn: &mut Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
    )?;
    let has_row: bool =
        conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .map(|n: i64| n > 0)?;
    if !has_row {
        conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])?;
    }

    let mut current = current_version(conn)?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute("UPDATE schema_version SET version = ?1", [migration.version])?;
        tx.commit()?;
        tracing::info!(version = migration.version, "applied schema migration");
        current = migration.version;
    }
    Ok(())
}

pub(crate) fn current_version(conn: &Connection) -> Result<u32, StoreError> {
    let version: u32 =
        conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))?;
    Ok(version)
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;

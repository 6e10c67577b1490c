// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store handle: connection ownership, pragmas, migration bootstrap.

use crate::error::StoreError;
use crate::migrations;
use parking_lot::Mutex;
use relay_core::{Clock, SystemClock};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Durable store for jobs, job events, and conversations.
///
/// Safe for concurrent use: all access goes through the connection
/// mutex, and the event log is append-only so readers never observe
/// in-place mutation of historical rows.
pub struct Store {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl Store {
    /// Open (or create) the database at `path` and apply pending
    /// migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    /// Open with an explicit clock (tests control timestamps).
    pub fn open_with_clock(path: &Path, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn, clock)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open_in_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn open_in_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, clock)
    }

    fn init(mut conn: Connection, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.pragma_update(None, "foreign_keys", "on")?;
        migrations::run(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn), clock })
    }

    /// Highest applied migration number.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        let conn = self.conn.lock();
        migrations::current_version(&conn)
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }
}

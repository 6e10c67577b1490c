// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use relay_core::JobStatus;
use thiserror::Error;

/// Errors from store operations.
///
/// A failed write is fatal to the owning job: losing a `job_events`
/// row would break the replay guarantee, so callers abort the job as
/// failed rather than continue in an inconsistent state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("invalid status transition: {from} -> {to}")]
    BadTransition { from: JobStatus, to: JobStatus },

    #[error("corrupt row: {0}")]
    Corrupt(String),
}
